//! `validate`: check the configuration before any file is touched.

use crate::error::{HookError, HookErrors, HookResult};
use crate::manager::Manager;
use crate::plugin::{Plugin, priority};
use crate::stage::Stage;

pub struct Validate;

impl Plugin for Validate {
    fn name(&self) -> &str {
        "validate"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Validate]
    }

    fn priority(&self, _stage: Stage) -> i32 {
        priority::FIRST
    }

    fn validate(&self, manager: &Manager) -> HookResult {
        let config = manager.config();
        let mut errors = HookErrors::new();

        if let Err(e) = config.validate() {
            errors.push(HookError::critical(e.to_string()));
        }
        if !config.content_dir.is_dir() {
            errors.push(
                HookError::critical("content directory does not exist")
                    .with_path(&config.content_dir),
            );
        }
        if config.output_dir.starts_with(&config.content_dir) {
            errors.push(
                HookError::warning("output directory is inside the content directory")
                    .with_path(&config.output_dir),
            );
        }
        errors.into_result()
    }
}
