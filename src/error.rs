pub type CutsceneResult<T> = Result<T, CutsceneError>;

#[derive(thiserror::Error, Debug)]
pub enum CutsceneError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing target: step {step} references '{target}'")]
    MissingTarget { step: usize, target: String },

    #[error("misconfigured collaborator: {0}")]
    MisconfiguredCollaborator(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CutsceneError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_target(step: usize, target: impl Into<String>) -> Self {
        Self::MissingTarget {
            step,
            target: target.into(),
        }
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::MisconfiguredCollaborator(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for CutsceneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CutsceneError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            CutsceneError::missing_target(3, "hero")
                .to_string()
                .contains("step 3 references 'hero'")
        );
        assert!(
            CutsceneError::collaborator("x")
                .to_string()
                .contains("misconfigured collaborator:")
        );
        assert!(
            CutsceneError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CutsceneError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn json_errors_map_to_serde() {
        let err: CutsceneError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CutsceneError::Serde(_)));
    }
}
