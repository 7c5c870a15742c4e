//! Process-wide table of named channels

use crate::analysis::set_debug_level;
use crate::channel::{Binding, Channel, LinkSpec, LogNotifier, ScanNotifier};
use crate::config::{validate_channel_name, SpectraConfig};
use crate::error::{Result, ResultExt, SpectraError};
use crate::scheduler::WorkerPool;
use crate::types::ChannelStatus;
use std::collections::HashMap;
use std::sync::{Arc, Once, PoisonError, RwLock};

static BANNER: Once = Once::new();

/// Owns the worker pool and every channel created on it.
///
/// Channels are created on first reference and never removed.
pub struct ChannelRegistry {
    pool: WorkerPool,
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    notifier: Arc<dyn ScanNotifier>,
}

impl ChannelRegistry {
    pub fn new(pool: WorkerPool) -> Self {
        Self::with_notifier(pool, Arc::new(LogNotifier))
    }

    pub fn with_notifier(pool: WorkerPool, notifier: Arc<dyn ScanNotifier>) -> Self {
        BANNER.call_once(|| {
            tracing::info!(
                "{} {} ({} workers)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                pool.size()
            );
        });
        Self {
            pool,
            channels: RwLock::new(HashMap::new()),
            notifier,
        }
    }

    /// Build the pool and all configured channels
    pub fn from_config(config: &SpectraConfig) -> Result<Self> {
        config.validate()?;
        set_debug_level(config.debug_level);

        let registry = Self::new(WorkerPool::new(config.pool.worker_count())?);
        for channel_config in &config.channels {
            let channel = registry
                .find_or_create(&channel_config.name)
                .with_context(|| format!("channel '{}'", channel_config.name))?;
            channel.set_window_type(channel_config.window);
            channel.set_sample_rate(channel_config.sample_rate);
            for request in &channel_config.outputs {
                channel.set_required_output_size(request.kind, request.size);
            }
        }
        Ok(registry)
    }

    pub fn find(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Look up a channel, creating it if needed. Concurrent callers with the
    /// same name all get the same channel.
    pub fn find_or_create(&self, name: &str) -> Result<Arc<Channel>> {
        if let Some(channel) = self.find(name) {
            return Ok(channel);
        }
        validate_channel_name(name)?;

        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let channel = channels.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!("Creating channel '{}'", name);
            Channel::new(name, &self.pool, Arc::clone(&self.notifier))
        });
        Ok(Arc::clone(channel))
    }

    /// Parse a link string and attach a new binding
    pub fn connect(&self, link: &str) -> Result<Arc<Binding>> {
        self.connect_parsed(&LinkSpec::parse(link)?)
    }

    pub fn connect_parsed(&self, link: &LinkSpec) -> Result<Arc<Binding>> {
        let channel = self.find_or_create(&link.channel)?;
        Ok(channel.attach(link.signal, link.trigger))
    }

    /// Trigger a channel by name
    pub fn trigger(&self, name: &str) -> Result<()> {
        let channel = self
            .find(name)
            .ok_or_else(|| SpectraError::NoSuchChannel(name.to_string()))?;
        channel.trigger()?;
        Ok(())
    }

    /// Sorted channel names
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Status of every channel, sorted by name
    pub fn status(&self) -> Vec<ChannelStatus> {
        self.channel_names()
            .iter()
            .filter_map(|name| self.find(name))
            .map(|channel| channel.status())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Stop the worker pool after queued work finishes
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("pool", &self.pool)
            .field("channels", &self.channel_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalType;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(WorkerPool::new(2).unwrap())
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let registry = registry();
        let a = registry.find_or_create("A1").unwrap();
        let b = registry.find_or_create("A1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.find("B1").is_none());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.find_or_create(""),
            Err(SpectraError::InvalidChannelName(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connect_first_trigger_wins() {
        let registry = registry();
        let first = registry.connect("A1 input-real trigger=Y").unwrap();
        let second = registry.connect("A1 sample-freq trigger=Y").unwrap();
        let out = registry.connect("A1 output-real").unwrap();
        assert!(first.is_trigger());
        assert!(!second.is_trigger());
        assert!(!out.is_trigger());
        assert_eq!(out.signal(), SignalType::OutputReal);
        assert!(Arc::ptr_eq(first.channel(), out.channel()));

        drop(first);
        let third = registry.connect("A1 windowtype trigger=Y").unwrap();
        assert!(third.is_trigger());
    }

    #[test]
    fn test_trigger_unknown_channel() {
        let registry = registry();
        assert!(matches!(
            registry.trigger("nope"),
            Err(SpectraError::NoSuchChannel(_))
        ));
    }

    #[test]
    fn test_channel_names_sorted() {
        let registry = registry();
        for name in ["c", "a", "b"] {
            registry.find_or_create(name).unwrap();
        }
        assert_eq!(registry.channel_names(), vec!["a", "b", "c"]);
        assert_eq!(registry.status().len(), 3);
    }
}
