//! The component catalog: one concrete type per [`ComponentKind`].

mod camera;
mod environment;
mod light;
mod line_renderer;
pub(crate) mod mesh;
mod physics;
mod script;
mod spatial;

pub use camera::{Camera, Projection};
pub use environment::{Environment, EnvironmentKind};
pub use light::{Light, LightKind};
pub use line_renderer::{LineRenderer, LineSegment};
pub use mesh::{MeshData, MeshRenderer};
pub use physics::{
    Collider, ColliderDesc, ColliderShape, Joint, JointDesc, MeshCollider, RigidBody,
    RigidBodySettings,
};
pub use script::Script;
pub use spatial::{Spatial, Transform};

use crate::component::{sealed, ComponentKind, ComponentType};

/// Bind each catalog type to its kind.
macro_rules! component_catalog {
    ($($ty:ident => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl ComponentType for $ty {
                const KIND: ComponentKind = ComponentKind::$kind;
            }
        )*
    };
}

component_catalog! {
    Spatial => Spatial,
    MeshData => MeshData,
    MeshRenderer => MeshRenderer,
    Light => Light,
    Camera => Camera,
    Environment => Environment,
    RigidBody => RigidBody,
    Collider => Collider,
    MeshCollider => MeshCollider,
    Joint => Joint,
    Script => Script,
    LineRenderer => LineRenderer,
}
