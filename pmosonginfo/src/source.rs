//! Metadata source strategy

/// A producer of artist/title updates.
///
/// Updates go to the `SongInfoSink` given at construction. A source is
/// owned by one playback session and disposed with it.
pub trait MetadataSource: Send {
    /// Begin producing updates. Calling it again restarts the source.
    fn start(&mut self);

    /// Stop producing updates. Idempotent.
    fn dispose(&mut self);

    /// Short identifier used in logs ("icy", "fip", "nova", ...).
    fn name(&self) -> &'static str;
}
