//! Insight memo - in-memory, append-only list of findings

use std::sync::Arc;
use tokio::sync::RwLock;

const MEMO_HEADER: &str = "📊 AACT Clinical Trials Analysis Memo 📊";
const EMPTY_MEMO: &str = "No insights yet.";

/// Append-only insight memo for the current server process.
///
/// Cloning shares the same underlying list.
#[derive(Clone, Default)]
pub struct InsightMemo {
    insights: Arc<RwLock<Vec<String>>>,
}

impl InsightMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an insight, returning the new total
    pub async fn append(&self, insight: String) -> usize {
        let mut insights = self.insights.write().await;
        insights.push(insight);
        insights.len()
    }

    pub async fn len(&self) -> usize {
        self.insights.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.insights.read().await.is_empty()
    }

    /// Snapshot of all insights in append order
    pub async fn insights(&self) -> Vec<String> {
        self.insights.read().await.clone()
    }

    /// Render the memo as text: header, one bullet per insight, summary
    pub async fn render(&self) -> String {
        let insights = self.insights.read().await;

        if insights.is_empty() {
            return EMPTY_MEMO.to_string();
        }

        let mut memo = format!("{}\n\nKey Insights Discovered:\n\n", MEMO_HEADER);
        for insight in insights.iter() {
            // Continuation lines stay under their bullet
            memo.push_str(&format!("- {}\n", insight.lines().collect::<Vec<_>>().join("\n  ")));
        }

        let noun = if insights.len() == 1 { "insight" } else { "insights" };
        memo.push_str(&format!(
            "\nSummary:\nAnalysis has revealed {} key {} about clinical trials.\n",
            insights.len(),
            noun
        ));

        memo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_memo_placeholder() {
        let memo = InsightMemo::new();
        assert!(memo.is_empty().await);
        assert_eq!(memo.render().await, "No insights yet.");
    }

    #[tokio::test]
    async fn test_append_returns_count() {
        let memo = InsightMemo::new();
        assert_eq!(memo.append("first".to_string()).await, 1);
        assert_eq!(memo.append("second".to_string()).await, 2);
        assert_eq!(memo.len().await, 2);
    }

    #[tokio::test]
    async fn test_render_keeps_append_order() {
        let memo = InsightMemo::new();
        memo.append("alpha".to_string()).await;
        memo.append("beta".to_string()).await;
        memo.append("gamma".to_string()).await;

        let rendered = memo.render().await;
        let bullets: Vec<&str> = rendered.lines().filter(|l| l.starts_with("- ")).collect();
        assert_eq!(bullets, vec!["- alpha", "- beta", "- gamma"]);
        assert!(rendered.contains("3 key insights"));

        // Rendering twice without appending is stable
        assert_eq!(memo.render().await, rendered);
    }

    #[tokio::test]
    async fn test_multiline_insight_stays_one_bullet() {
        let memo = InsightMemo::new();
        memo.append("Phase 3 trials:\n40% oncology\r\n20% cardiology".to_string()).await;
        memo.append("second".to_string()).await;

        let rendered = memo.render().await;
        assert!(rendered.contains("- Phase 3 trials:\n  40% oncology\n  20% cardiology\n- second\n"));
        assert_eq!(rendered.lines().filter(|l| l.starts_with("- ")).count(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let memo = InsightMemo::new();
        let other = memo.clone();
        other.append("shared".to_string()).await;
        assert_eq!(memo.insights().await, vec!["shared".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let memo = InsightMemo::new();
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let memo = memo.clone();
                tokio::spawn(async move { memo.append(format!("finding {}", i)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(memo.len().await, 20);
    }
}
