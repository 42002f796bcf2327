//! Metadata source factory
//!
//! Picks the polling strategy that applies to a station API URL. Entries are
//! tried in registration order; the first matching predicate wins. No match
//! means the caller should fall back to the embedded stream tags.

use reqwest::Client;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::Result;
use crate::fip::FipProvider;
use crate::nova::NovaProvider;
use crate::polling::{PollingOptions, PollingSource, SongProvider};
use crate::song::SongInfoSink;
use crate::source::MetadataSource;

/// Shared resources handed to every source the factory builds.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub client: Client,
    pub runtime: Handle,
    pub options: PollingOptions,
}

impl SourceContext {
    /// Build the HTTP client from `options`.
    pub fn new(runtime: Handle, options: PollingOptions) -> Result<Self> {
        Ok(Self {
            client: options.build_client()?,
            runtime,
            options,
        })
    }
}

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Builder =
    Box<dyn Fn(&SourceContext, &str, SongInfoSink) -> Box<dyn MetadataSource> + Send + Sync>;

struct Entry {
    name: &'static str,
    matches: Predicate,
    build: Builder,
}

/// Registry of metadata source builders.
pub struct SourceFactory {
    context: SourceContext,
    entries: Vec<Entry>,
}

impl SourceFactory {
    /// An empty registry.
    pub fn new(context: SourceContext) -> Self {
        Self {
            context,
            entries: Vec::new(),
        }
    }

    /// FIP (`/fip/`) then Nova (`/nova`).
    pub fn with_defaults(context: SourceContext) -> Self {
        let mut factory = Self::new(context);
        factory
            .register_polling::<FipProvider>("/fip/")
            .register_polling::<NovaProvider>("/nova");
        factory
    }

    /// Register a custom builder.
    pub fn register<M, B>(&mut self, name: &'static str, matches: M, build: B) -> &mut Self
    where
        M: Fn(&str) -> bool + Send + Sync + 'static,
        B: Fn(&SourceContext, &str, SongInfoSink) -> Box<dyn MetadataSource>
            + Send
            + Sync
            + 'static,
    {
        self.entries.push(Entry {
            name,
            matches: Box::new(matches),
            build: Box::new(build),
        });
        self
    }

    /// Register provider `P` for URLs containing `fragment`.
    pub fn register_polling<P: SongProvider>(&mut self, fragment: &'static str) -> &mut Self {
        self.register(
            P::NAME,
            move |url: &str| url.contains(fragment),
            |ctx: &SourceContext, url: &str, sink: SongInfoSink| -> Box<dyn MetadataSource> {
                Box::new(PollingSource::<P>::new(
                    url,
                    ctx.client.clone(),
                    ctx.runtime.clone(),
                    ctx.options.clone(),
                    sink,
                ))
            },
        )
    }

    /// Registered source names, in dispatch order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub fn context(&self) -> &SourceContext {
        &self.context
    }

    /// Build the source for `api_url`, or `None` when nothing matches.
    pub fn get_downloader(
        &self,
        api_url: &str,
        sink: SongInfoSink,
    ) -> Option<Box<dyn MetadataSource>> {
        let entry = self.entries.iter().find(|entry| (entry.matches)(api_url))?;
        debug!(source = entry.name, url = api_url, "Metadata source selected");
        Some((entry.build)(&self.context, api_url, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::SongInfo;
    use std::sync::Arc;

    fn sink() -> SongInfoSink {
        Arc::new(|_song: SongInfo| {})
    }

    fn factory() -> SourceFactory {
        let context = SourceContext::new(Handle::current(), PollingOptions::default()).unwrap();
        SourceFactory::with_defaults(context)
    }

    #[tokio::test]
    async fn test_dispatch_by_url() {
        let factory = factory();
        assert_eq!(factory.names(), vec!["fip", "nova"]);

        let fip = factory
            .get_downloader("https://api.radiofrance.fr/livemeta/fip/live", sink())
            .unwrap();
        assert_eq!(fip.name(), "fip");

        let nova = factory
            .get_downloader("https://www.nova.fr/wp-json/radios/nova/live", sink())
            .unwrap();
        assert_eq!(nova.name(), "nova");

        assert!(factory
            .get_downloader("https://example.com/nowplaying.json", sink())
            .is_none());
        assert!(factory.get_downloader("", sink()).is_none());
    }

    #[tokio::test]
    async fn test_registration_order_wins() {
        let mut factory = factory();
        factory.register(
            "custom",
            |url: &str| url.contains("/fip/"),
            |_ctx: &SourceContext, _url: &str, _sink: SongInfoSink| -> Box<dyn MetadataSource> {
                unreachable!("shadowed by the fip entry")
            },
        );

        let source = factory
            .get_downloader("https://api.radiofrance.fr/livemeta/fip/live", sink())
            .unwrap();
        assert_eq!(source.name(), "fip");
        assert_eq!(factory.names(), vec!["fip", "nova", "custom"]);
    }
}
