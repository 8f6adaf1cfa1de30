//! Permission models for the build roles.

use cbuild_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How much access the build roles receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionModel {
    /// Read-only source access plus read/write on the artifact and cache
    /// buckets the project is bound to.
    #[default]
    Scoped,
    /// Read/write on every bucket and `AdministratorAccess` on the Deploy
    /// role. Needs explicit approval.
    Broad,
}

impl PermissionModel {
    pub fn requires_approval(self) -> bool {
        matches!(self, PermissionModel::Broad)
    }
}

impl std::fmt::Display for PermissionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionModel::Scoped => write!(f, "scoped"),
            PermissionModel::Broad => write!(f, "broad"),
        }
    }
}

impl std::str::FromStr for PermissionModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scoped" => Ok(PermissionModel::Scoped),
            "broad" => Ok(PermissionModel::Broad),
            other => Err(Error::InvalidInput(format!(
                "unknown permission model: {}",
                other
            ))),
        }
    }
}

/// Options for one synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthOptions {
    pub permissions: PermissionModel,
    /// Sign-off for attaching `AdministratorAccess` in the broad model.
    pub approve_admin_policy: bool,
    /// Template description; a default is used when absent.
    pub description: Option<String>,
}

impl SynthOptions {
    pub fn scoped() -> Self {
        Self::default()
    }

    /// The broad model with the admin policy signed off.
    pub fn broad_approved() -> Self {
        Self {
            permissions: PermissionModel::Broad,
            approve_admin_policy: true,
            description: None,
        }
    }

    /// Reject the broad model unless it was explicitly approved.
    pub fn check(&self) -> Result<()> {
        if self.permissions.requires_approval() && !self.approve_admin_policy {
            return Err(Error::Forbidden(
                "the broad permission model attaches AdministratorAccess to the Deploy role; \
                 pass --approve-admin-policy to sign off"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_is_default() {
        assert_eq!(PermissionModel::default(), PermissionModel::Scoped);
        assert!(SynthOptions::default().check().is_ok());
    }

    #[test]
    fn test_broad_requires_approval() {
        let options = SynthOptions {
            permissions: PermissionModel::Broad,
            ..Default::default()
        };
        assert!(matches!(options.check(), Err(Error::Forbidden(_))));
        assert!(SynthOptions::broad_approved().check().is_ok());
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "Broad".parse::<PermissionModel>().unwrap(),
            PermissionModel::Broad
        );
        assert_eq!(
            "scoped".parse::<PermissionModel>().unwrap(),
            PermissionModel::Scoped
        );
        assert!("admin".parse::<PermissionModel>().is_err());
    }
}
