//! Preflight checks and normalization of an image configuration.
//!
//! Validation is fail-fast: the first invalid user or group is reported and
//! the remaining accounts are not inspected.

use crate::config::{ImageConfiguration, OsRelease};
use crate::error::{AccountEntity, ConfigViolation, Result, ViolationReason};

/// Entrypoint type that runs a supervised service bundle.
pub const SERVICE_BUNDLE_TYPE: &str = "service-bundle";

/// Supervisor invocation used for service bundles.
pub const SERVICE_BUNDLE_COMMAND: &str = "/bin/s6-svscan /sv";

/// Package providing the service supervisor.
pub const SERVICE_BUNDLE_PACKAGE: &str = "s6";

pub const DEFAULT_OS_ID: &str = "alpine";
pub const DEFAULT_OS_NAME: &str = "apko-generated image";
pub const DEFAULT_OS_VERSION_ID: &str = "3.16";
pub const DEFAULT_OS_HOME_URL: &str = "https://github.com/chainguard-dev/apko";

impl ImageConfiguration {
    /// Run preflight checks and apply defaults.
    ///
    /// In order:
    /// 1. service-bundle specialization, so account checks see the final set
    /// 2. users, in declaration order: non-empty username, UID != 0
    /// 3. groups, in declaration order: non-empty group name, GID != 0
    /// 4. OS release defaults for empty fields
    ///
    /// # Errors
    ///
    /// Returns [`crate::ApkoError::Configuration`] for the first failing account.
    pub fn validate(mut self) -> Result<Self> {
        if self.entrypoint.type_ == SERVICE_BUNDLE_TYPE {
            self.validate_service_bundle();
        }

        for user in &self.accounts.users {
            check_account(AccountEntity::User, &user.username, user.uid)?;
        }

        for group in &self.accounts.groups {
            check_account(AccountEntity::Group, &group.groupname, group.gid)?;
        }

        self.os_release.apply_defaults();

        tracing::debug!(
            users = self.accounts.users.len(),
            groups = self.accounts.groups.len(),
            packages = self.contents.packages.len(),
            "Validated image configuration"
        );

        Ok(self)
    }

    /// Point the entrypoint at the s6 supervisor and make sure it is installed.
    ///
    /// The command is always overwritten. The supervisor package is only
    /// appended when it is not already listed.
    pub fn validate_service_bundle(&mut self) {
        self.entrypoint.command = SERVICE_BUNDLE_COMMAND.to_string();

        if !self
            .contents
            .packages
            .iter()
            .any(|p| p == SERVICE_BUNDLE_PACKAGE)
        {
            self.contents
                .packages
                .push(SERVICE_BUNDLE_PACKAGE.to_string());
        }
    }
}

fn check_account(entity: AccountEntity, name: &str, id: u32) -> Result<()> {
    let reason = if name.is_empty() {
        ViolationReason::MissingName
    } else if id == 0 {
        ViolationReason::RootId
    } else {
        return Ok(());
    };

    Err(ConfigViolation {
        entity,
        name: name.to_string(),
        id,
        reason,
    }
    .into())
}

impl OsRelease {
    /// Fill empty fields with fallback values. Set fields are never touched,
    /// so applying this more than once changes nothing.
    pub fn apply_defaults(&mut self) {
        if self.id.is_empty() {
            self.id = DEFAULT_OS_ID.to_string();
        }

        if self.name.is_empty() {
            self.name = DEFAULT_OS_NAME.to_string();
        }

        if self.pretty_name.is_empty() {
            self.pretty_name = DEFAULT_OS_NAME.to_string();
        }

        if self.version_id.is_empty() {
            self.version_id = DEFAULT_OS_VERSION_ID.to_string();
        }

        if self.home_url.is_empty() {
            self.home_url = DEFAULT_OS_HOME_URL.to_string();
        }
    }
}
