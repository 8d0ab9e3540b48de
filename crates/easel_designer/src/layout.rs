use easel_model::{BeanInstance, LayoutConstraints, PropertyValue};
use std::collections::HashMap;

/// One child handed to a layout for arrangement: its render instance plus
/// the constraints the container's layout state holds for it.
pub struct LayoutItem<'a> {
    pub instance: &'a mut BeanInstance,
    pub constraints: Option<LayoutConstraints>,
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("cannot arrange child {index}: {reason}")]
    Arrange { index: usize, reason: String },
}

/// Arrangement collaborator of one replicated container. Implementations
/// write position and size through the children's bean instances.
pub trait ReplicaLayout {
    fn arrange(
        &self,
        container: &mut BeanInstance,
        children: &mut [LayoutItem<'_>],
    ) -> Result<(), LayoutError>;

    /// False means one child cannot be removed incrementally and the caller
    /// has to clear the container and re-add the remaining children.
    fn remove_component(&self, child: &mut BeanInstance) -> bool;
}

fn set_bounds(
    index: usize,
    instance: &mut BeanInstance,
    x: i32,
    y: i32,
    width: Option<i32>,
    height: Option<i32>,
) -> Result<(), LayoutError> {
    let mut write = |name: &str, value: i32| {
        instance
            .set(name, PropertyValue::Integer(value))
            .map_err(|e| LayoutError::Arrange { index, reason: e.to_string() })
    };
    write("X", x)?;
    write("Y", y)?;
    if let Some(width) = width {
        write("Width", width)?;
    }
    if let Some(height) = height {
        write("Height", height)?;
    }
    Ok(())
}

fn int_prop(instance: &BeanInstance, name: &str, fallback: i32) -> i32 {
    instance.get(name).and_then(|v| v.as_int()).unwrap_or(fallback)
}

/// Children sit exactly where their absolute bounds say.
#[derive(Debug, Default)]
pub struct AbsoluteBoundsLayout;

impl ReplicaLayout for AbsoluteBoundsLayout {
    fn arrange(
        &self,
        _container: &mut BeanInstance,
        children: &mut [LayoutItem<'_>],
    ) -> Result<(), LayoutError> {
        for (index, item) in children.iter_mut().enumerate() {
            if let Some(LayoutConstraints::Absolute(bounds)) = &item.constraints {
                set_bounds(
                    index,
                    item.instance,
                    bounds.x,
                    bounds.y,
                    Some(bounds.width),
                    Some(bounds.height),
                )?;
            }
        }
        Ok(())
    }

    fn remove_component(&self, _child: &mut BeanInstance) -> bool {
        true
    }
}

/// Left-to-right row, keeping each child's own size.
#[derive(Debug)]
pub struct FlowRowLayout {
    pub gap: i32,
}

impl Default for FlowRowLayout {
    fn default() -> Self {
        Self { gap: 6 }
    }
}

impl ReplicaLayout for FlowRowLayout {
    fn arrange(
        &self,
        _container: &mut BeanInstance,
        children: &mut [LayoutItem<'_>],
    ) -> Result<(), LayoutError> {
        let mut x = self.gap;
        for (index, item) in children.iter_mut().enumerate() {
            let width = int_prop(item.instance, "Width", 100);
            set_bounds(index, item.instance, x, self.gap, None, None)?;
            x += width + self.gap;
        }
        Ok(())
    }

    fn remove_component(&self, _child: &mut BeanInstance) -> bool {
        true
    }
}

/// Fixed cell grid addressed by row/column constraints; unconstrained
/// children fill down the first column.
#[derive(Debug)]
pub struct GridSlotLayout {
    pub cell_width: i32,
    pub cell_height: i32,
}

impl Default for GridSlotLayout {
    fn default() -> Self {
        Self { cell_width: 160, cell_height: 40 }
    }
}

impl ReplicaLayout for GridSlotLayout {
    fn arrange(
        &self,
        _container: &mut BeanInstance,
        children: &mut [LayoutItem<'_>],
    ) -> Result<(), LayoutError> {
        for (index, item) in children.iter_mut().enumerate() {
            let (row, col, row_span, col_span) = match &item.constraints {
                Some(LayoutConstraints::Grid { row, col, row_span, col_span }) => {
                    (*row, *col, (*row_span).max(1), (*col_span).max(1))
                }
                _ => (index as i32, 0, 1, 1),
            };
            set_bounds(
                index,
                item.instance,
                col * self.cell_width,
                row * self.cell_height,
                Some(col_span * self.cell_width),
                Some(row_span * self.cell_height),
            )?;
        }
        Ok(())
    }

    // Slot bookkeeping is positional, there is no incremental removal.
    fn remove_component(&self, _child: &mut BeanInstance) -> bool {
        false
    }
}

/// Layouts by class name, as referenced from a container's layout state.
pub struct LayoutFactory {
    by_class: HashMap<String, Box<dyn ReplicaLayout>>,
}

impl LayoutFactory {
    pub fn new() -> Self {
        Self { by_class: HashMap::new() }
    }

    /// The built-in layout set, matching the registry's layout beans.
    pub fn standard() -> Self {
        let mut factory = Self::new();
        factory.register("AbsoluteLayout", Box::new(AbsoluteBoundsLayout));
        factory.register("FlowLayout", Box::<FlowRowLayout>::default());
        factory.register("GridLayout", Box::<GridSlotLayout>::default());
        factory
    }

    pub fn register(&mut self, class_name: &str, layout: Box<dyn ReplicaLayout>) {
        self.by_class.insert(class_name.to_string(), layout);
    }

    pub fn get(&self, class_name: &str) -> Option<&dyn ReplicaLayout> {
        self.by_class.get(class_name).map(|b| b.as_ref())
    }
}

impl Default for LayoutFactory {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_model::{BeanRegistry, Bounds};

    #[test]
    fn absolute_layout_applies_bounds() {
        let registry = BeanRegistry::standard();
        let mut container = registry.create_instance("Panel").unwrap();
        let mut child = registry.create_instance("Button").unwrap();
        let mut items = [LayoutItem {
            instance: &mut child,
            constraints: Some(LayoutConstraints::Absolute(Bounds::new(10, 20, 120, 30))),
        }];
        AbsoluteBoundsLayout.arrange(&mut container, &mut items).unwrap();
        assert_eq!(child.get("X"), Some(&PropertyValue::Integer(10)));
        assert_eq!(child.get("Height"), Some(&PropertyValue::Integer(30)));
    }

    #[test]
    fn grid_layout_refuses_incremental_removal() {
        let registry = BeanRegistry::standard();
        let mut child = registry.create_instance("Button").unwrap();
        assert!(!GridSlotLayout::default().remove_component(&mut child));
        assert!(AbsoluteBoundsLayout.remove_component(&mut child));
    }
}
