//! External check plugins.
//!
//! A [`Plugin`] is either a local executable invoked by its argv, a local
//! WebAssembly file, or a WebAssembly plugin hosted on a registry. Wasm
//! plugins carry a data source; the bytes are read at most once and their
//! P1 digest is computed at most once, however many callers ask.

use std::fmt;
use std::sync::Arc;

use strata_cas::{p1_digest, Digest, DigestType};
use strata_common::{Memo, ModuleFullName};
use strata_config::{PluginConfig, PluginConfigType};
use tracing::debug;

use crate::error::CheckError;

/// Produces the bytes of a Wasm plugin.
pub type PluginDataFn = Arc<dyn Fn() -> Result<Vec<u8>, CheckError> + Send + Sync>;

/// A validated plugin description.
pub struct Plugin {
    full_name: Option<ModuleFullName>,
    args: Vec<String>,
    opaque_id: String,
    description: String,
    is_local: bool,
    is_wasm: bool,
    get_data: Option<PluginDataFn>,
    data: Memo<Arc<Vec<u8>>, CheckError>,
    p1_digest: Memo<Digest, CheckError>,
}

impl Plugin {
    /// A local executable. `args[0]` is the program.
    pub fn new_local(args: Vec<String>, description: Option<String>) -> Result<Self, CheckError> {
        Self::new(None, args, description, true, false, None)
    }

    /// A local Wasm file at `path`, run with `args`.
    pub fn new_local_wasm(
        path: impl Into<String>,
        args: Vec<String>,
        get_data: Option<PluginDataFn>,
        description: Option<String>,
    ) -> Result<Self, CheckError> {
        let mut argv = vec![path.into()];
        argv.extend(args);
        Self::new(None, argv, description, true, true, get_data)
    }

    /// A Wasm plugin hosted on a registry.
    pub fn new_remote_wasm(
        full_name: ModuleFullName,
        args: Vec<String>,
        get_data: Option<PluginDataFn>,
        description: Option<String>,
    ) -> Result<Self, CheckError> {
        Self::new(Some(full_name), args, description, false, true, get_data)
    }

    /// Builds a plugin from a config entry. `get_data` supplies the bytes
    /// of Wasm plugins and is ignored for executables.
    pub fn from_config(config: &PluginConfig, get_data: Option<PluginDataFn>) -> Result<Self, CheckError> {
        match config.plugin_type {
            PluginConfigType::Local => {
                let mut argv = vec![config.name.clone()];
                argv.extend(config.args.iter().cloned());
                Self::new_local(argv, None)
            }
            PluginConfigType::LocalWasm => {
                Self::new_local_wasm(config.name.clone(), config.args.clone(), get_data, None)
            }
            PluginConfigType::Remote => {
                let full_name = ModuleFullName::parse(&config.name).map_err(|err| {
                    CheckError::invalid_plugin(format!("invalid remote plugin name: {err}"))
                })?;
                Self::new_remote_wasm(full_name, config.args.clone(), get_data, None)
            }
        }
    }

    fn new(
        full_name: Option<ModuleFullName>,
        args: Vec<String>,
        description: Option<String>,
        is_local: bool,
        is_wasm: bool,
        get_data: Option<PluginDataFn>,
    ) -> Result<Self, CheckError> {
        if !is_local && full_name.is_none() {
            return Err(CheckError::invalid_plugin("remote plugins must have a full name"));
        }
        if !is_local && !is_wasm {
            return Err(CheckError::invalid_plugin("remote plugins must be Wasm plugins"));
        }
        if full_name.is_none() && args.first().map_or(true, |program| program.is_empty()) {
            return Err(CheckError::invalid_plugin(
                "local plugins must name a program or Wasm file",
            ));
        }
        let opaque_id = match &full_name {
            Some(full_name) => full_name.to_string(),
            None => args.join(" "),
        };
        if is_wasm && get_data.is_none() {
            return Err(CheckError::invalid_plugin(format!(
                "Wasm plugin {opaque_id} has no data"
            )));
        }
        let description = description
            .filter(|description| !description.is_empty())
            .unwrap_or_else(|| opaque_id.clone());
        Ok(Self {
            full_name,
            args,
            opaque_id,
            description,
            is_local,
            is_wasm,
            get_data,
            data: Memo::new(),
            p1_digest: Memo::new(),
        })
    }

    /// The full name for remote plugins, or the joined argv for local ones.
    pub fn opaque_id(&self) -> &str {
        &self.opaque_id
    }

    /// The registry name of a remote plugin.
    pub fn full_name(&self) -> Option<&ModuleFullName> {
        self.full_name.as_ref()
    }

    /// The arguments. For local plugins the first is the program or file.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The description, or the opaque ID when none was given.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the plugin lives on the local filesystem.
    pub fn is_local(&self) -> bool {
        self.is_local
    }

    /// Whether the plugin is WebAssembly.
    pub fn is_wasm(&self) -> bool {
        self.is_wasm
    }

    /// The plugin's bytes, read once.
    pub fn data(&self) -> Result<Arc<Vec<u8>>, CheckError> {
        let get_data = match (&self.get_data, self.is_wasm) {
            (Some(get_data), true) => get_data,
            _ => {
                return Err(CheckError::NotWasm {
                    id: self.opaque_id.clone(),
                })
            }
        };
        self.data.get_or_try_init(|| {
            let data = get_data()?;
            if data.is_empty() {
                return Err(CheckError::invalid_plugin(format!(
                    "Wasm plugin {} has no data",
                    self.opaque_id
                )));
            }
            debug!("read {} bytes for plugin {}", data.len(), self.opaque_id);
            Ok(Arc::new(data))
        })
    }

    /// The digest of the plugin's bytes. Only [`DigestType::P1`] applies.
    pub fn digest(&self, digest_type: DigestType) -> Result<Digest, CheckError> {
        if digest_type != DigestType::P1 {
            return Err(CheckError::UnsupportedDigestType { digest_type });
        }
        self.p1_digest
            .get_or_try_init(|| Ok(p1_digest(self.data()?.as_slice())))
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("opaque_id", &self.opaque_id)
            .field("is_local", &self.is_local)
            .field("is_wasm", &self.is_wasm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(bytes: &'static [u8]) -> (PluginDataFn, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let get_data: PluginDataFn = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(bytes.to_vec())
        });
        (get_data, calls)
    }

    fn name(value: &str) -> ModuleFullName {
        ModuleFullName::parse(value).unwrap()
    }

    #[test]
    fn local_plugin_is_identified_by_its_argv() {
        let plugin = Plugin::new_local(vec!["lint-extra".to_string(), "--strict".to_string()], None).unwrap();
        assert_eq!(plugin.opaque_id(), "lint-extra --strict");
        assert_eq!(plugin.description(), "lint-extra --strict");
        assert!(plugin.is_local());
        assert!(!plugin.is_wasm());
        assert!(matches!(plugin.data(), Err(CheckError::NotWasm { .. })));
        assert!(matches!(plugin.digest(DigestType::P1), Err(CheckError::NotWasm { .. })));
    }

    #[test]
    fn validation_rejects_incomplete_plugins() {
        assert!(Plugin::new_local(Vec::new(), None).is_err());
        assert!(Plugin::new_local(vec![String::new()], None).is_err());
        assert!(Plugin::new_local_wasm("check.wasm", Vec::new(), None, None).is_err());
        let err = Plugin::new_remote_wasm(name("r.com/acme/check"), Vec::new(), None, None).unwrap_err();
        assert_eq!(err.to_string(), "invalid plugin: Wasm plugin r.com/acme/check has no data");
    }

    #[test]
    fn remote_plugin_is_identified_by_full_name() {
        let (get_data, _) = counting(b"\0asm");
        let plugin = Plugin::new_remote_wasm(
            name("r.com/acme/check"),
            Vec::new(),
            Some(get_data),
            Some("Extra checks".to_string()),
        )
        .unwrap();
        assert_eq!(plugin.opaque_id(), "r.com/acme/check");
        assert_eq!(plugin.description(), "Extra checks");
        assert!(!plugin.is_local());
        assert!(plugin.is_wasm());
    }

    #[test]
    fn p1_digest_is_memoized_and_reads_once() {
        let (get_data, calls) = counting(b"\0asm\x01");
        let plugin = Plugin::new_local_wasm("check.wasm", Vec::new(), Some(get_data), None).unwrap();
        let first = plugin.digest(DigestType::P1).unwrap();
        let second = plugin.digest(DigestType::P1).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, p1_digest(b"\0asm\x01"));
        assert_eq!(plugin.data().unwrap().as_slice(), b"\0asm\x01");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn module_digest_types_are_unsupported() {
        let (get_data, calls) = counting(b"\0asm");
        let plugin = Plugin::new_local_wasm("check.wasm", Vec::new(), Some(get_data), None).unwrap();
        assert!(matches!(
            plugin.digest(DigestType::B5),
            Err(CheckError::UnsupportedDigestType { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_data_fails_every_time() {
        let (get_data, calls) = counting(b"");
        let plugin = Plugin::new_local_wasm("check.wasm", Vec::new(), Some(get_data), None).unwrap();
        assert!(plugin.data().is_err());
        assert!(plugin.digest(DigestType::P1).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_entries_map_to_plugins() {
        let config = PluginConfig {
            plugin_type: PluginConfigType::Local,
            name: "lint-extra".to_string(),
            args: vec!["--strict".to_string()],
            options: BTreeMap::new(),
        };
        assert_eq!(Plugin::from_config(&config, None).unwrap().opaque_id(), "lint-extra --strict");

        let remote = PluginConfig {
            plugin_type: PluginConfigType::Remote,
            name: "not-a-name".to_string(),
            ..config
        };
        let (get_data, _) = counting(b"\0asm");
        assert!(matches!(
            Plugin::from_config(&remote, Some(get_data)),
            Err(CheckError::InvalidPlugin { .. })
        ));
    }
}
