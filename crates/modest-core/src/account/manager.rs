//! Account manager.
//!
//! Stores accounts and server accounts in the configuration store, one
//! directory per account, using the key codec in [`super::key`].

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::credentials;
use super::key::{self, DecomposedKey};
use super::model::{AccountData, ServerAccountData, settings};
use super::validation::{ServerRole, validate_server_account};
use crate::config::{ConfigStore, ConfigValue};
use crate::protocol::{AuthProtocol, ConnectionProtocol, ProtocolInfo, TransportStoreProtocol};
use crate::{Error, Result};

/// Key holding the name of the default account.
pub const DEFAULT_ACCOUNT_KEY: &str = "/apps/modest/default_account";

/// Manages account configuration.
#[derive(Debug, Clone)]
pub struct AccountManager {
    store: ConfigStore,
}

impl AccountManager {
    /// Create a manager on top of a configuration store.
    #[must_use]
    pub const fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// The underlying configuration store.
    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Whether an account (or server account) exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn account_exists(&self, name: &str, is_server_account: bool) -> Result<bool> {
        match key::compose(name, None, is_server_account) {
            Some(key) => self.store.exists(&key).await,
            None => Ok(false),
        }
    }

    /// Add a server account.
    ///
    /// The account is validated for the role its protocol plays and written
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidServerAccount`] if validation fails,
    /// [`Error::AccountExists`] if the name is taken, or an error if the
    /// store fails.
    pub async fn add_server_account(&self, data: &ServerAccountData) -> Result<()> {
        let name = data.name.as_str();
        let role = if data.protocol.is_transport() {
            ServerRole::Transport
        } else {
            ServerRole::Store
        };
        validate_server_account(data, role).map_err(|errors| Error::InvalidServerAccount {
            name: name.to_string(),
            errors,
        })?;
        if self.account_exists(name, true).await? {
            return Err(Error::AccountExists(name.to_string()));
        }

        let entry = |setting: &str, value: ConfigValue| -> Result<(String, ConfigValue)> {
            Ok((account_key(name, Some(setting), true)?, value))
        };
        let entries = [
            entry(settings::HOSTNAME, data.hostname.as_str().into())?,
            entry(settings::USERNAME, data.username.as_str().into())?,
            entry(settings::PROTO, data.protocol.name().into())?,
            entry(settings::PORT, i64::from(data.port).into())?,
            entry(settings::SECURITY, data.security.name().into())?,
            entry(settings::AUTH_MECH, data.auth.name().into())?,
        ];
        self.store.set_many(&entries).await?;

        info!("Added server account {name} ({})", data.protocol.name());
        Ok(())
    }

    /// Add an account using existing server accounts.
    ///
    /// New accounts are enabled. The first account becomes the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountExists`] if the name is taken,
    /// [`Error::AccountNotFound`] if a server account does not exist, or an
    /// error if the store fails.
    pub async fn add_account(
        &self,
        name: &str,
        display_name: &str,
        store_account: Option<&str>,
        transport_account: Option<&str>,
    ) -> Result<()> {
        if self.account_exists(name, false).await? {
            return Err(Error::AccountExists(name.to_string()));
        }
        for server in [store_account, transport_account].into_iter().flatten() {
            if !self.account_exists(server, true).await? {
                return Err(Error::AccountNotFound(server.to_string()));
            }
        }

        self.set_string(name, settings::DISPLAY_NAME, display_name, false)
            .await?;
        self.set_bool(name, settings::ENABLED, true, false).await?;
        if let Some(server) = store_account {
            self.set_string(name, settings::STORE_ACCOUNT, server, false)
                .await?;
        }
        if let Some(server) = transport_account {
            self.set_string(name, settings::TRANSPORT_ACCOUNT, server, false)
                .await?;
        }

        if self.get_default_account().await?.is_none() {
            self.set_default_account(name).await?;
        }

        info!("Added account {name}");
        Ok(())
    }

    /// Remove an account (or server account) with all its settings.
    ///
    /// Removing an account also removes its store and transport server
    /// accounts. Returns the names of the removed server accounts so their
    /// credentials can be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if the account does not exist, or
    /// an error if the store fails.
    pub async fn remove_account(&self, name: &str, is_server_account: bool) -> Result<Vec<String>> {
        if !self.account_exists(name, is_server_account).await? {
            return Err(Error::AccountNotFound(name.to_string()));
        }

        let mut removed_servers = Vec::new();
        if is_server_account {
            removed_servers.push(name.to_string());
        } else {
            for setting in [settings::STORE_ACCOUNT, settings::TRANSPORT_ACCOUNT] {
                if let Some(server) = self.get_string(name, setting, false).await?
                    && self.account_exists(&server, true).await?
                {
                    self.store.remove(&account_key(&server, None, true)?).await?;
                    removed_servers.push(server);
                }
            }
        }

        self.store
            .remove(&account_key(name, None, is_server_account)?)
            .await?;

        if !is_server_account && self.stored_default().await?.as_deref() == Some(name) {
            let next = self.account_names(false).await?.into_iter().next();
            match next {
                Some(next) => self.set_default_account(&next).await?,
                None => {
                    self.store.remove(DEFAULT_ACCOUNT_KEY).await?;
                }
            }
        }

        info!("Removed account {name}");
        Ok(removed_servers)
    }

    /// Names of the configured accounts, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn account_names(&self, only_enabled: bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for name in self.names_in(false).await? {
            if !only_enabled || self.is_enabled(&name).await? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Names of the configured server accounts, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn server_account_names(&self) -> Result<Vec<String>> {
        self.names_in(true).await
    }

    async fn names_in(&self, is_server_account: bool) -> Result<Vec<String>> {
        let dirs = self
            .store
            .list_subdirs(key::namespace(is_server_account))
            .await?;
        Ok(dirs
            .into_iter()
            .filter_map(|dir| {
                let name = key::unescape(&dir);
                if name.is_none() {
                    warn!("Skipping malformed account directory {dir:?}");
                }
                name
            })
            .collect())
    }

    /// Get a string setting of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn get_string(
        &self,
        name: &str,
        setting: &str,
        is_server_account: bool,
    ) -> Result<Option<String>> {
        self.store
            .get_string(&account_key(name, Some(setting), is_server_account)?)
            .await
    }

    /// Set a string setting of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn set_string(
        &self,
        name: &str,
        setting: &str,
        value: &str,
        is_server_account: bool,
    ) -> Result<()> {
        self.store
            .set_string(&account_key(name, Some(setting), is_server_account)?, value)
            .await
    }

    /// Get an integer setting of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn get_int(
        &self,
        name: &str,
        setting: &str,
        is_server_account: bool,
    ) -> Result<Option<i64>> {
        self.store
            .get_int(&account_key(name, Some(setting), is_server_account)?)
            .await
    }

    /// Set an integer setting of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn set_int(
        &self,
        name: &str,
        setting: &str,
        value: i64,
        is_server_account: bool,
    ) -> Result<()> {
        self.store
            .set_int(&account_key(name, Some(setting), is_server_account)?, value)
            .await
    }

    /// Get a boolean setting of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn get_bool(
        &self,
        name: &str,
        setting: &str,
        is_server_account: bool,
    ) -> Result<Option<bool>> {
        self.store
            .get_bool(&account_key(name, Some(setting), is_server_account)?)
            .await
    }

    /// Set a boolean setting of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn set_bool(
        &self,
        name: &str,
        setting: &str,
        value: bool,
        is_server_account: bool,
    ) -> Result<()> {
        self.store
            .set_bool(&account_key(name, Some(setting), is_server_account)?, value)
            .await
    }

    /// Name of the default account, if it still exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn get_default_account(&self) -> Result<Option<String>> {
        let Some(name) = self.stored_default().await? else {
            return Ok(None);
        };
        if self.account_exists(&name, false).await? {
            Ok(Some(name))
        } else {
            debug!("Default account {name} no longer exists");
            Ok(None)
        }
    }

    async fn stored_default(&self) -> Result<Option<String>> {
        self.store.get_string(DEFAULT_ACCOUNT_KEY).await
    }

    /// Make `name` the default account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if the account does not exist, or
    /// an error if the store fails.
    pub async fn set_default_account(&self, name: &str) -> Result<()> {
        if !self.account_exists(name, false).await? {
            return Err(Error::AccountNotFound(name.to_string()));
        }
        self.store.set_string(DEFAULT_ACCOUNT_KEY, name).await
    }

    /// Enable or disable an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.set_bool(name, settings::ENABLED, enabled, false).await
    }

    /// Whether an account is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn is_enabled(&self, name: &str) -> Result<bool> {
        Ok(self
            .get_bool(name, settings::ENABLED, false)
            .await?
            .unwrap_or(false))
    }

    /// Name shown for an account, falling back to the account name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn display_name(&self, name: &str) -> Result<String> {
        Ok(self
            .get_string(name, settings::DISPLAY_NAME, false)
            .await?
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| name.to_string()))
    }

    /// Record the time of the last successful update of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn set_last_updated(&self, name: &str, when: DateTime<Utc>) -> Result<()> {
        self.set_int(name, settings::LAST_UPDATED, when.timestamp(), false)
            .await
    }

    /// Time of the last successful update of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn last_updated(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .get_int(name, settings::LAST_UPDATED, false)
            .await?
            .and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }

    /// Load a server account.
    ///
    /// Unknown protocol tokens are loaded as the `Unknown` sentinels.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn server_account_data(&self, name: &str) -> Result<Option<ServerAccountData>> {
        if !self.account_exists(name, true).await? {
            return Ok(None);
        }

        let port = self
            .get_int(name, settings::PORT, true)
            .await?
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(0);

        Ok(Some(ServerAccountData {
            name: name.to_string(),
            hostname: self.server_text(name, settings::HOSTNAME).await?,
            username: self.server_text(name, settings::USERNAME).await?,
            protocol: TransportStoreProtocol::from_name(
                &self.server_text(name, settings::PROTO).await?,
            ),
            port,
            security: ConnectionProtocol::from_name(
                &self.server_text(name, settings::SECURITY).await?,
            ),
            auth: AuthProtocol::from_name(&self.server_text(name, settings::AUTH_MECH).await?),
        }))
    }

    /// Load an account together with its server accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn account_data(&self, name: &str) -> Result<Option<AccountData>> {
        if !self.account_exists(name, false).await? {
            return Ok(None);
        }

        let mut servers = [None, None];
        for (slot, setting) in servers
            .iter_mut()
            .zip([settings::STORE_ACCOUNT, settings::TRANSPORT_ACCOUNT])
        {
            if let Some(server) = self.get_string(name, setting, false).await? {
                *slot = self.server_account_data(&server).await?;
            }
        }
        let [store_account, transport_account] = servers;

        Ok(Some(AccountData {
            name: name.to_string(),
            display_name: self.display_name(name).await?,
            fullname: self
                .get_string(name, settings::FULLNAME, false)
                .await?
                .unwrap_or_default(),
            email: self
                .get_string(name, settings::EMAIL, false)
                .await?
                .unwrap_or_default(),
            enabled: self.is_enabled(name).await?,
            store_account,
            transport_account,
        }))
    }

    /// Store the password of an existing server account in the keyring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if the server account does not
    /// exist, or an error if the store or keyring fails.
    pub async fn set_password(&self, server_account: &str, password: &str) -> Result<()> {
        if !self.account_exists(server_account, true).await? {
            return Err(Error::AccountNotFound(server_account.to_string()));
        }
        credentials::store_password(server_account, password)?;
        Ok(())
    }

    /// Password of a server account, if one is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring fails.
    #[allow(clippy::unused_self)] // Keeps the password API next to set_password
    pub fn password(&self, server_account: &str) -> Result<Option<String>> {
        Ok(credentials::get_password(server_account)?)
    }

    /// Identify the account a configuration key belongs to.
    #[must_use]
    pub fn account_from_key(key: &str) -> Option<DecomposedKey> {
        key::decompose(key)
    }

    /// First free account name derived from `base`.
    ///
    /// Tries `base`, then `base_2`, `base_3`, and so on.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn unique_account_name(&self, base: &str, is_server_account: bool) -> Result<String> {
        let base = match base.trim() {
            "" => "account",
            trimmed => trimmed,
        };
        if !self.account_exists(base, is_server_account).await? {
            return Ok(base.to_string());
        }
        let mut n = 2_u32;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.account_exists(&candidate, is_server_account).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn server_text(&self, name: &str, setting: &str) -> Result<String> {
        Ok(self.get_string(name, setting, true).await?.unwrap_or_default())
    }
}

/// Compose an account key, turning an illegal key into an error.
fn account_key(name: &str, setting: Option<&str>, is_server_account: bool) -> Result<String> {
    key::compose(name, setting, is_server_account)
        .ok_or_else(|| Error::InvalidKey(format!("{name}/{}", setting.unwrap_or_default())))
}
