//! A snapshot of what the renderer has drawn, for readiness checks.

/// What the dashboard currently shows.
///
/// Renderers fill this in from their own state and use
/// [`RenderSnapshot::is_render_complete`] (or the weaker
/// [`RenderSnapshot::is_basic_data_loaded`]) as the poll's readiness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSnapshot {
    /// Total tweet count shown in the summary card.
    pub total: u64,
    /// Positive count shown.
    pub positive: u64,
    /// Neutral count shown.
    pub neutral: u64,
    /// Negative count shown.
    pub negative: u64,
    /// Hashtag rows rendered.
    pub hashtags: usize,
    /// Topic rows rendered.
    pub topics: usize,
    /// At least one chart has finished drawing.
    pub charts_ready: bool,
    /// The word cloud has finished layout.
    pub word_cloud_ready: bool,
}

impl RenderSnapshot {
    /// Summary numbers and at least one list are on screen.
    ///
    /// ```rust
    /// use sentiview::RenderSnapshot;
    ///
    /// let mut snapshot = RenderSnapshot { total: 120, positive: 70, ..Default::default() };
    /// assert!(!snapshot.is_basic_data_loaded());
    ///
    /// snapshot.topics = 5;
    /// assert!(snapshot.is_basic_data_loaded());
    /// ```
    pub fn is_basic_data_loaded(&self) -> bool {
        self.total > 0
            && (self.positive > 0 || self.neutral > 0 || self.negative > 0)
            && (self.hashtags > 0 || self.topics > 0)
    }

    /// Basic data plus charts or the word cloud.
    pub fn is_render_complete(&self) -> bool {
        self.is_basic_data_loaded() && (self.charts_ready || self.word_cloud_ready)
    }
}
