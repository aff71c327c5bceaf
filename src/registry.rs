//! Pid-to-account mapping shared between the control endpoint and the
//! credential filesystems.
//!
//! A single mutex guards the in-memory table. Every mutation writes the
//! table back to disk before returning, so a restarted daemon picks up where
//! the previous one left off. Persistence failures are logged and the
//! in-memory state stays authoritative until the next mutation retries.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::process;

pub struct AccountRegistry {
    state_file: PathBuf,
    default_account: String,
    inner: Mutex<HashMap<i32, String>>,
}

impl AccountRegistry {
    /// Loads the registry from `state_file`, starting empty if the file is
    /// missing or does not parse.
    pub fn load<P: Into<PathBuf>>(state_file: P, default_account: &str) -> Self {
        let state_file = state_file.into();
        let map = match fs::read_to_string(&state_file) {
            Ok(raw) => match parse_snapshot(&raw) {
                Some(map) => map,
                None => {
                    log::warn!(
                        "registry file {:?} is not a valid snapshot, starting empty",
                        state_file
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                log::warn!(
                    "could not read registry file {:?}: {}, starting empty",
                    state_file,
                    e
                );
                HashMap::new()
            }
        };

        Self {
            state_file,
            default_account: default_account.to_owned(),
            inner: Mutex::new(map),
        }
    }

    /// Inserts or overwrites the mapping for `pid`.
    pub fn register(&self, pid: i32, account: &str) {
        let mut map = self.inner.lock().unwrap();
        map.insert(pid, account.to_owned());
        self.save(&map);
        log::info!("registered pid {} -> account '{}'", pid, account);
    }

    /// Removes the mapping for `pid` if present.
    pub fn unregister(&self, pid: i32) {
        let mut map = self.inner.lock().unwrap();
        if let Some(account) = map.remove(&pid) {
            self.save(&map);
            log::info!("unregistered pid {} (was account '{}')", pid, account);
        }
    }

    /// Resolves the account for `pid` by walking up the process tree.
    ///
    /// The first registered ancestor wins; pids already seen are skipped so
    /// a malformed process table cannot loop the walk. Falls back to the
    /// default account.
    pub fn lookup(&self, pid: i32) -> String {
        let map = self.inner.lock().unwrap();
        let mut visited = HashSet::new();
        let mut current = pid;
        while current > 0 && visited.insert(current) {
            if let Some(account) = map.get(&current) {
                return account.clone();
            }
            current = process::parent_of(current);
        }

        self.default_account.clone()
    }

    /// Returns a consistent copy of the table.
    pub fn list(&self) -> HashMap<i32, String> {
        self.inner.lock().unwrap().clone()
    }

    /// Drops every entry whose pid no longer exists. Returns the number of
    /// entries removed.
    pub fn sweep_stale(&self) -> usize {
        let mut map = self.inner.lock().unwrap();
        let stale: Vec<i32> = map
            .keys()
            .copied()
            .filter(|pid| !process::is_alive(*pid))
            .collect();
        for pid in &stale {
            if let Some(account) = map.remove(pid) {
                log::info!("cleaning stale pid {} (account '{}')", pid, account);
            }
        }
        if !stale.is_empty() {
            self.save(&map);
        }

        stale.len()
    }

    /// Serializes the table to `<state_file>.tmp` and renames it into place,
    /// so a concurrent reader never observes a partial snapshot.
    fn save(&self, map: &HashMap<i32, String>) {
        if let Err(e) = self.try_save(map) {
            log::error!("could not persist registry to {:?}: {}", self.state_file, e);
        }
    }

    fn try_save(&self, map: &HashMap<i32, String>) -> std::io::Result<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot: HashMap<String, &String> =
            map.iter().map(|(pid, account)| (pid.to_string(), account)).collect();
        let raw = serde_json::to_string_pretty(&snapshot)?;

        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.state_file)?;
        Ok(())
    }
}

fn parse_snapshot(raw: &str) -> Option<HashMap<i32, String>> {
    let snapshot: HashMap<String, String> = serde_json::from_str(raw).ok()?;
    let mut map = HashMap::with_capacity(snapshot.len());
    for (pid, account) in snapshot {
        map.insert(pid.parse::<i32>().ok()?, account);
    }
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_temp_dir;
    use anyhow::Result;

    #[test]
    fn test_register_and_lookup() -> Result<()> {
        let tmp = create_temp_dir("test_register_and_lookup")?;
        let registry = AccountRegistry::load(tmp.join("pid-map.json"), "default");

        let pid = std::process::id() as i32;
        registry.register(pid, "alice");
        assert_eq!(registry.lookup(pid), "alice");
        Ok(())
    }

    #[test]
    fn test_lookup_walks_ancestry() -> Result<()> {
        let tmp = create_temp_dir("test_lookup_walks_ancestry")?;
        let registry = AccountRegistry::load(tmp.join("pid-map.json"), "default");

        // Register the parent of this test process; resolving our own pid
        // must walk up to it.
        let ppid = process::parent_of(std::process::id() as i32);
        assert!(ppid > 0);
        registry.register(ppid, "bob");
        assert_eq!(registry.lookup(std::process::id() as i32), "bob");
        Ok(())
    }

    #[test]
    fn test_lookup_unknown_is_default() -> Result<()> {
        let tmp = create_temp_dir("test_lookup_unknown_is_default")?;
        let registry = AccountRegistry::load(tmp.join("pid-map.json"), "default");
        assert_eq!(registry.lookup(std::process::id() as i32), "default");
        assert_eq!(registry.lookup(0), "default");
        Ok(())
    }

    #[test]
    fn test_persistence_round_trip() -> Result<()> {
        let tmp = create_temp_dir("test_persistence_round_trip")?;
        let state_file = tmp.join("pid-map.json");

        let registry = AccountRegistry::load(&state_file, "default");
        registry.register(1000, "alice");
        registry.register(2000, "bob");
        registry.unregister(2000);

        let reloaded = AccountRegistry::load(&state_file, "default");
        let map = reloaded.list();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1000).map(String::as_str), Some("alice"));
        Ok(())
    }

    #[test]
    fn test_snapshot_is_two_space_indented_json() -> Result<()> {
        let tmp = create_temp_dir("test_snapshot_format")?;
        let state_file = tmp.join("pid-map.json");

        let registry = AccountRegistry::load(&state_file, "default");
        registry.register(1000, "alice");

        let raw = fs::read_to_string(&state_file)?;
        assert!(raw.contains("  \"1000\": \"alice\""));
        Ok(())
    }

    #[test]
    fn test_load_tolerates_garbage() -> Result<()> {
        let tmp = create_temp_dir("test_load_tolerates_garbage")?;
        let state_file = tmp.join("pid-map.json");

        fs::write(&state_file, "not json at all")?;
        assert!(AccountRegistry::load(&state_file, "default").list().is_empty());

        fs::write(&state_file, "{\"not-a-pid\": \"alice\"}")?;
        assert!(AccountRegistry::load(&state_file, "default").list().is_empty());
        Ok(())
    }

    #[test]
    fn test_sweep_stale_removes_dead_pids() -> Result<()> {
        let tmp = create_temp_dir("test_sweep_stale")?;
        let registry = AccountRegistry::load(tmp.join("pid-map.json"), "default");

        let mut child = std::process::Command::new("true").spawn()?;
        let dead_pid = child.id() as i32;
        child.wait()?;

        let live_pid = std::process::id() as i32;
        registry.register(dead_pid, "carol");
        registry.register(live_pid, "alice");

        assert_eq!(registry.sweep_stale(), 1);
        let map = registry.list();
        assert!(!map.contains_key(&dead_pid));
        assert_eq!(map.get(&live_pid).map(String::as_str), Some("alice"));
        Ok(())
    }
}
