//! Scene graph and hierarchical scene organization.
//!
//! A loaded model file becomes a tree of [`SceneNode`]s: [`ModelNode`]s carry
//! meshes and a GPU instance buffer, [`ContainerNode`]s only group children.
//! Each node keeps a local and a world [`Instance`]; world transforms are
//! propagated from the root down and then written to the instance buffers.

use std::sync::Arc;

use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::{Instance, InstanceRaw},
        model,
    },
    render::Instanced,
};

pub trait SceneNode {
    fn get_local_transform(&self) -> Instance;

    fn set_local_transform(&mut self, instance: Instance);

    fn get_world_transform(&self) -> Instance;

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /// Recomputes this node's world transform from its parent's and recurses.
    fn update_world_transform(&mut self, parent: &Instance);

    fn update_world_transform_all(&mut self) {
        self.update_world_transform(&Instance::default());
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue);

    fn get_render(&self) -> Vec<Instanced<'_>>;
}

/// Converts a glTF node (and its subtree) into scene nodes.
///
/// `meshes` holds the already uploaded primitives of every glTF mesh, indexed
/// by mesh index; they are moved out as they get attached.
pub fn to_scene_node(
    node: gltf::scene::Node,
    meshes: &mut Vec<Option<Vec<model::Mesh>>>,
    materials: &Arc<Vec<model::Material>>,
    device: &wgpu::Device,
) -> Box<dyn SceneNode> {
    let primitives = node
        .mesh()
        .and_then(|mesh| meshes.get_mut(mesh.index()).and_then(Option::take));
    let mut scene_node: Box<dyn SceneNode> = match primitives {
        Some(primitives) => {
            let model = model::Model {
                meshes: primitives,
                materials: materials.clone(),
            };
            Box::new(ModelNode::from_model(device, model))
        }
        None => {
            if let Some(mesh) = node.mesh() {
                // glTF allows several nodes to instantiate the same mesh
                warn!(
                    "Mesh {} is referenced by more than one node, only the first one is drawn.",
                    mesh.index()
                );
            }
            Box::new(ContainerNode::new())
        }
    };
    let (translation, rotation, scale) = node.transform().decomposed();
    scene_node.set_local_transform(Instance {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    });
    for child in node.children() {
        let child_node = to_scene_node(child, meshes, materials, device);
        scene_node.add_child(child_node);
    }

    scene_node
}

/// Groups the root nodes of a loaded file under a fresh container.
///
/// The container is the node the application places in the world. Root
/// nodes keep their own transforms from the file (axis conversion, unit
/// scale), so they must never be overwritten by a placement.
pub fn wrap_roots(roots: Vec<Box<dyn SceneNode>>) -> Box<dyn SceneNode> {
    Box::new(ContainerNode::with_children(roots))
}

/// Sets the world placement of a model root and refreshes the world
/// transforms below it.
pub fn place(root: &mut dyn SceneNode, placement: &Instance) {
    root.set_local_transform(placement.clone());
    root.update_world_transform_all();
}

pub struct ContainerNode {
    pub children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Instance,
}

impl ContainerNode {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            local: Instance::default(),
            world: Instance::default(),
        }
    }

    pub fn with_children(children: Vec<Box<dyn SceneNode>>) -> Self {
        Self {
            children,
            ..Self::new()
        }
    }
}

impl Default for ContainerNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneNode for ContainerNode {
    fn get_local_transform(&self) -> Instance {
        self.local.clone()
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.world.clone()
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn update_world_transform(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transform(&self.world);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

pub struct ModelNode {
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: wgpu::Buffer,
    local: Instance,
    world: Instance,
    model: model::Model,
}

impl ModelNode {
    pub fn from_model(device: &wgpu::Device, model: model::Model) -> Self {
        let world = Instance::default();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[world.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            children: vec![],
            instance_buffer,
            local: Instance::default(),
            world,
            model,
        }
    }
}

impl SceneNode for ModelNode {
    fn get_local_transform(&self) -> Instance {
        self.local.clone()
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.world.clone()
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn update_world_transform(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transform(&self.world);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        let raw: [InstanceRaw; 1] = [self.world.to_raw()];
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .chain([Instanced {
                instance: &self.instance_buffer,
                model: &self.model,
                amount: 1,
            }])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Quaternion, Rotation3, Vector3};

    use super::*;

    #[test]
    fn world_transforms_propagate_through_containers() {
        let mut grandchild = ContainerNode::new();
        grandchild.set_local_transform(Instance::from(Vector3::new(0.0, 1.0, 0.0)));
        let mut child = ContainerNode::with_children(vec![Box::new(grandchild)]);
        child.set_local_transform(Instance::placed(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
        ));
        let mut root = ContainerNode::with_children(vec![Box::new(child)]);
        root.set_local_transform(Instance::from(Vector3::new(0.0, 0.0, -50.0)));

        root.update_world_transform_all();

        let child = &root.get_children()[0];
        assert_eq!(child.get_world_transform().position, Vector3::new(1.0, 0.0, -50.0));
        let grandchild = &child.get_children()[0];
        assert_eq!(grandchild.get_world_transform().position, Vector3::new(1.0, 2.0, -50.0));
        assert_eq!(grandchild.get_world_transform().scale, Vector3::new(2.0, 2.0, 2.0));
        assert!(root.get_render().is_empty());
    }

    #[test]
    fn placement_keeps_the_file_root_transform() {
        // Z-up file: the root turns the model upright
        let mut child = ContainerNode::new();
        child.set_local_transform(Instance::from(Vector3::new(0.0, 0.0, 1.0)));
        let mut file_root = ContainerNode::with_children(vec![Box::new(child)]);
        file_root.set_local_transform(Instance {
            rotation: Quaternion::from_angle_x(Deg(-90.0)),
            ..Instance::new()
        });
        let mut model = wrap_roots(vec![Box::new(file_root)]);

        let car = Instance::placed(Vector3::new(0.0, 3.0, 0.0), Vector3::new(2.0, 2.0, 2.0));
        place(model.as_mut(), &car);
        // Placing again every frame must not accumulate
        place(model.as_mut(), &car);

        let file_root = &model.get_children()[0];
        assert_eq!(file_root.get_local_transform().rotation, Quaternion::from_angle_x(Deg(-90.0)));
        let child = &file_root.get_children()[0];
        let position = child.get_world_transform().position;
        assert!((position - Vector3::new(0.0, 5.0, 0.0)).magnitude() < 1e-5);
    }
}
