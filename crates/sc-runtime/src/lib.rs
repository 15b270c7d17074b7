mod navigator;
pub mod sandbox;
mod session;
mod template;

pub use navigator::{Diagnostic, LinkDescriptor, NavRender, NavState, RenderedPassage};
pub use sandbox::{
    Capability, CapabilityClass, FragmentReport, Sandbox, SandboxOptions, TemplateScope,
    CAPABILITIES,
};
pub use session::{DebugView, Session, SessionOptions};

#[cfg(test)]
mod session_tests;
