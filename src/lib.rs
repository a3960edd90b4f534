//! Async client for the Blockade Labs generation API: skybox styles,
//! generator backends, and the submit → poll → download job workflow.

pub mod blockade;
pub mod settings;
pub mod workflow;

pub use blockade::types::{
    Generator, GeneratorField, ImaginePoll, SkyboxStyle, SkyboxStyleField, UserInput,
};
pub use blockade::BlockadeClient;
pub use settings::Settings;
pub use workflow::{
    cancel_channel, run_imagine_generation, run_skybox_generation, CancelHandle, CancelToken,
    GeneratedImage, WorkflowConfig,
};
