//! Render composition.
//!
//! Flows describe what they want drawn with a [`Render`] tree. The frame loop
//! flattens every flow's tree into a list of [`Instanced`] draws and issues
//! them with the model pipeline.

use crate::data_structures::{model::Model, scene_graph::SceneNode};

/// Data for instanced object rendering: a model and its instance buffer.
#[derive(Clone, Copy)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
}

/// Specifies what a flow renders this frame.
///
/// - `None` renders nothing
/// - `Default(Instanced)` renders a single instanced object
/// - `Defaults(Vec<Instanced>)` renders a batch of instanced objects
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    /// Flattens the tree into a draw list, skipping draws without instances.
    pub(crate) fn flatten(self) -> Vec<Instanced<'a>> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out.retain(|instanced| {
            if instanced.amount == 0 {
                log::warn!("you attempted to render something with zero instances");
            }
            instanced.amount > 0
        });
        out
    }

    fn collect_into(self, out: &mut Vec<Instanced<'a>>) {
        match self {
            Render::Default(instanced) => out.push(instanced),
            Render::Defaults(vec) => out.extend(vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.collect_into(out)),
            Render::None => (),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Render::None => true,
            Render::Default(_) => false,
            Render::Defaults(vec) => vec.is_empty(),
            Render::Composed(renders) => renders.iter().all(Render::is_empty),
        }
    }
}

impl<'a> From<&'a dyn SceneNode> for Render<'a> {
    fn from(sn: &'a dyn SceneNode) -> Self {
        Render::Defaults(sn.get_render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_empty_renders_are_empty() {
        let render = Render::Composed(vec![Render::None, Render::Defaults(Vec::new())]);
        assert!(render.is_empty());

        assert!(render.flatten().is_empty());
    }
}
