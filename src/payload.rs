//! The analysis payload returned by the analysis-data endpoint, plus tweet
//! filtering and pagination for the tweets tab.
//!
//! The server fills missing spreadsheet cells with empty strings, so numeric
//! tweet fields accept either a number or a string and decode to `None` when
//! neither parses.

use serde::{Deserialize, Deserializer, Serialize};

/// Sentiment label predicted for a tweet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    /// `"Positif"`
    #[serde(rename = "Positif")]
    Positive,
    /// `"Netral"`
    #[serde(rename = "Netral")]
    Neutral,
    /// `"Negatif"`
    #[serde(rename = "Negatif")]
    Negative,
    /// Any other label, including the empty string.
    #[default]
    #[serde(other)]
    Unknown,
}

/// One hashtag and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagCount {
    /// Hashtag text without `#`.
    pub tag: String,
    /// Occurrences.
    pub count: u64,
}

/// One extracted topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TopicRepr")]
pub struct Topic {
    /// Topic label.
    pub topic: String,
    /// How often it occurred, when the server reports it.
    pub frequency: Option<u64>,
}

/// Topics arrive either as `{"topic": .., "frequency": ..}` or as bare strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum TopicRepr {
    Full {
        topic: String,
        #[serde(default)]
        frequency: Option<u64>,
    },
    Bare(String),
}

impl From<TopicRepr> for Topic {
    fn from(repr: TopicRepr) -> Self {
        match repr {
            TopicRepr::Full { topic, frequency } => Self { topic, frequency },
            TopicRepr::Bare(topic) => Self {
                topic,
                frequency: None,
            },
        }
    }
}

/// A classified tweet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tweet {
    /// Author handle.
    pub username: String,
    /// Tweet text.
    pub content: String,
    /// Date as sent by the server.
    pub date: String,
    /// Like count.
    #[serde(deserialize_with = "lenient_number")]
    pub likes: Option<f64>,
    /// Retweet count.
    #[serde(deserialize_with = "lenient_number")]
    pub retweets: Option<f64>,
    /// Reply count.
    #[serde(deserialize_with = "lenient_number")]
    pub replies: Option<f64>,
    /// Predicted label.
    pub predicted_sentiment: Sentiment,
    /// Model confidence.
    #[serde(deserialize_with = "lenient_number")]
    pub confidence: Option<f64>,
    /// Link to the tweet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_url: Option<String>,
    /// Attached image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Language code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Free-form location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
        Null(()),
    }

    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Some(n),
        NumberOrText::Text(s) => s.trim().parse().ok(),
        NumberOrText::Null(()) => None,
    })
}

/// The full analysis result rendered by the dashboard.
///
/// Fields the dashboard does not render are ignored on decode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPayload {
    /// Analysis title.
    pub title: String,
    /// Analysis description.
    pub description: String,
    /// Number of tweets analysed.
    pub total_tweets: u64,
    /// Tweets labelled positive.
    pub positive_count: u64,
    /// Tweets labelled neutral.
    pub neutral_count: u64,
    /// Tweets labelled negative.
    pub negative_count: u64,
    /// Positive share, in percent.
    pub positive_percent: f64,
    /// Neutral share, in percent.
    pub neutral_percent: f64,
    /// Negative share, in percent.
    pub negative_percent: f64,
    /// Most frequent hashtags.
    pub top_hashtags: Vec<HashtagCount>,
    /// Extracted topics.
    pub topics: Vec<Topic>,
    /// All classified tweets.
    pub tweets: Vec<Tweet>,
}

impl AnalysisPayload {
    /// Returns true when there is nothing to render.
    pub fn is_empty(&self) -> bool {
        self.total_tweets == 0 && self.tweets.is_empty()
    }

    /// Count per sentiment label.
    pub fn count_for(&self, sentiment: Sentiment) -> u64 {
        match sentiment {
            Sentiment::Positive => self.positive_count,
            Sentiment::Neutral => self.neutral_count,
            Sentiment::Negative => self.negative_count,
            Sentiment::Unknown => self
                .total_tweets
                .saturating_sub(
                    self.positive_count
                        .saturating_add(self.neutral_count)
                        .saturating_add(self.negative_count),
                ),
        }
    }

    /// Filter and paginate the tweet list.
    ///
    /// ```rust
    /// use sentiview::payload::{AnalysisPayload, Sentiment, Tweet, TweetQuery};
    ///
    /// let tweet = |content: &str, sentiment| Tweet {
    ///     content: content.into(),
    ///     predicted_sentiment: sentiment,
    ///     ..Default::default()
    /// };
    /// let payload = AnalysisPayload {
    ///     tweets: vec![
    ///         tweet("harga naik lagi", Sentiment::Negative),
    ///         tweet("Harga turun", Sentiment::Positive),
    ///         tweet("cuaca cerah", Sentiment::Positive),
    ///     ],
    ///     ..Default::default()
    /// };
    ///
    /// let page = payload.query(
    ///     &TweetQuery::default()
    ///         .with_sentiment(Sentiment::Positive)
    ///         .with_search("HARGA"),
    /// );
    /// assert_eq!(page.total_matches, 1);
    /// assert_eq!(page.tweets[0].content, "Harga turun");
    /// ```
    pub fn query(&self, query: &TweetQuery) -> TweetPage<'_> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let matches: Vec<&Tweet> = self
            .tweets
            .iter()
            .filter(|t| query.sentiment.is_none_or(|s| t.predicted_sentiment == s))
            .filter(|t| {
                needle.as_deref().is_none_or(|n| {
                    t.content.to_lowercase().contains(n) || t.username.to_lowercase().contains(n)
                })
            })
            .collect();

        let per_page = query.per_page.max(1);
        let total_matches = matches.len();
        let total_pages = total_matches.div_ceil(per_page).max(1);
        let page = query.page.clamp(1, total_pages);

        let tweets = matches
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        TweetPage {
            tweets,
            page,
            total_pages,
            total_matches,
        }
    }
}

/// Filter and page selection for [`AnalysisPayload::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetQuery {
    /// Keep only this label.
    pub sentiment: Option<Sentiment>,
    /// Case-insensitive substring of content or username.
    pub search: Option<String>,
    /// Page size; zero is treated as one.
    pub per_page: usize,
    /// 1-indexed page, clamped into range.
    pub page: usize,
}

impl Default for TweetQuery {
    fn default() -> Self {
        Self {
            sentiment: None,
            search: None,
            per_page: 10,
            page: 1,
        }
    }
}

impl TweetQuery {
    /// Keep only tweets with this label.
    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    /// Keep only tweets matching `search`.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Select a page.
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Set the page size.
    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }
}

/// One page of filtered tweets.
#[derive(Debug, Clone, PartialEq)]
pub struct TweetPage<'a> {
    /// Tweets on this page.
    pub tweets: Vec<&'a Tweet>,
    /// The page actually returned (after clamping).
    pub page: usize,
    /// Number of pages, at least one.
    pub total_pages: usize,
    /// Tweets matching the filter across all pages.
    pub total_matches: usize,
}
