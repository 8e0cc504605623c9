use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use vaulta_core::{FlowCategory, TurnError};

use crate::collaborators::IntentClassifier;

/// Keyword table checked in order; the first category with a hit wins.
const FLOW_KEYWORDS: [(FlowCategory, &[&str]); 6] = [
    (FlowCategory::CardIssues, &["card", "atm", "lost", "stolen", "declined", "cash not dispensed"]),
    (
        FlowCategory::AccountServicing,
        &["balance", "statement", "transaction", "profile", "address", "recent"],
    ),
    (FlowCategory::AccountOpening, &["open account", "new account", "onboard"]),
    (FlowCategory::DigitalSupport, &["login", "otp", "app", "device", "crash"]),
    (FlowCategory::Transfers, &["transfer", "bill pay", "beneficiary", "wire", "ach"]),
    (FlowCategory::AccountClosure, &["close account", "closure", "retain"]),
];

const TOPIC_CHANGE_PHRASES: &[&str] = &[
    "actually",
    "instead",
    "never mind",
    "wait",
    "hold on",
    "let me",
    "i want to",
    "can you help me with something else",
    "different",
    "something else",
];

const INFLECTIONS: [&str; 5] = ["s", "es", "d", "ed", "ing"];

/// True when `keyword` occurs in `text` as a whole word, optionally followed
/// by a plain inflection: "cards" mentions "card", "crashing" mentions
/// "crash", but "appreciate" does not mention "app" and "each" does not
/// mention "ach".
pub(crate) fn mentions(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(index, _)| {
        let starts_word =
            text[..index].chars().next_back().map_or(true, |previous| !previous.is_alphanumeric());
        let rest = &text[index + keyword.len()..];
        let tail_len = rest.find(|ch: char| !ch.is_alphanumeric()).unwrap_or(rest.len());
        let tail = &rest[..tail_len];
        starts_word && (tail.is_empty() || INFLECTIONS.contains(&tail))
    })
}

pub(crate) fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| mentions(text, keyword))
}

pub fn keyword_flow(text: &str) -> Option<FlowCategory> {
    let lowered = text.to_lowercase();
    FLOW_KEYWORDS
        .iter()
        .find(|(_, keywords)| mentions_any(&lowered, keywords))
        .map(|(flow, _)| *flow)
}

pub fn has_intent_keyword(text: &str) -> bool {
    keyword_flow(text).is_some()
}

pub fn is_topic_change(text: &str) -> bool {
    mentions_any(&text.to_lowercase(), TOPIC_CHANGE_PHRASES)
}

#[derive(Clone, Copy, Debug)]
pub struct RouteRequest<'a> {
    pub text: &'a str,
    pub current_flow: Option<FlowCategory>,
    /// Keep an established flow no matter what the text says.
    pub lock_flow: bool,
    /// Skip stickiness for this turn and classify from scratch.
    pub force_reroute: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteSource {
    Locked,
    Sticky,
    Keyword,
    Classifier,
    Unclassified,
    ClassifierUnavailable,
}

impl RouteSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Sticky => "sticky",
            Self::Keyword => "keyword",
            Self::Classifier => "classifier",
            Self::Unclassified => "unclassified",
            Self::ClassifierUnavailable => "classifier_unavailable",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteDecision {
    pub flow: Option<FlowCategory>,
    pub source: RouteSource,
}

pub struct DialogueRouter {
    classifier: Arc<dyn IntentClassifier>,
    timeout: Duration,
}

impl DialogueRouter {
    pub fn new(classifier: Arc<dyn IntentClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    pub async fn route(&self, request: RouteRequest<'_>) -> RouteDecision {
        if let Some(flow) = request.current_flow {
            if request.lock_flow {
                return RouteDecision { flow: Some(flow), source: RouteSource::Locked };
            }
            if !request.force_reroute && !is_topic_change(request.text) {
                return RouteDecision { flow: Some(flow), source: RouteSource::Sticky };
            }
        }

        if let Some(flow) = keyword_flow(request.text) {
            return RouteDecision { flow: Some(flow), source: RouteSource::Keyword };
        }

        if request.text.trim().is_empty() {
            return RouteDecision { flow: None, source: RouteSource::Unclassified };
        }

        self.classify(request.text).await
    }

    async fn classify(&self, text: &str) -> RouteDecision {
        let error = match tokio::time::timeout(self.timeout, self.classifier.classify_intent(text))
            .await
        {
            Ok(Ok(Some(flow))) => {
                debug!(event_name = "turn.route.classified", flow = %flow, "classifier picked a flow");
                return RouteDecision { flow: Some(flow), source: RouteSource::Classifier };
            }
            Ok(Ok(None)) => {
                return RouteDecision { flow: None, source: RouteSource::Unclassified };
            }
            Ok(Err(error)) => TurnError::ClassificationUnavailable(error.to_string()),
            Err(_) => TurnError::ClassificationUnavailable("timed out".to_string()),
        };

        warn!(
            event_name = "turn.route.classifier_unavailable",
            error_code = error.code(),
            "intent classifier unavailable, leaving flow unset"
        );
        RouteDecision { flow: None, source: RouteSource::ClassifierUnavailable }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use vaulta_core::FlowCategory;

    use super::{
        is_topic_change, keyword_flow, mentions, DialogueRouter, RouteRequest, RouteSource,
    };
    use crate::collaborators::IntentClassifier;

    #[derive(Default)]
    struct ScriptedClassifier {
        answer: Option<FlowCategory>,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IntentClassifier for ScriptedClassifier {
        async fn classify_intent(&self, _utterance: &str) -> Result<Option<FlowCategory>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(anyhow!("provider returned 503"));
            }
            Ok(self.answer)
        }
    }

    fn router(classifier: Arc<ScriptedClassifier>) -> DialogueRouter {
        DialogueRouter::new(classifier, Duration::from_millis(50))
    }

    fn fresh(text: &str) -> RouteRequest<'_> {
        RouteRequest { text, current_flow: None, lock_flow: false, force_reroute: false }
    }

    #[test]
    fn keyword_categories_are_checked_in_order() {
        assert_eq!(keyword_flow("I lost my card"), Some(FlowCategory::CardIssues));
        assert_eq!(keyword_flow("what's my balance"), Some(FlowCategory::AccountServicing));
        assert_eq!(keyword_flow("card balance please"), Some(FlowCategory::CardIssues));
        assert_eq!(keyword_flow("the app keeps crashing"), Some(FlowCategory::DigitalSupport));
        assert_eq!(keyword_flow("send a wire"), Some(FlowCategory::Transfers));
        assert_eq!(keyword_flow("I'd like closure on this"), Some(FlowCategory::AccountClosure));
        assert_eq!(keyword_flow("i feel happy about each thing"), None);
        assert_eq!(keyword_flow("my cards were declined"), Some(FlowCategory::CardIssues));
    }

    #[test]
    fn keywords_do_not_match_inside_longer_words() {
        assert_eq!(keyword_flow("I really appreciate it"), None);
        assert_eq!(keyword_flow("how does the application process look"), None);
        assert_eq!(keyword_flow("please approve it"), None);
        assert!(mentions("the atm never dispensed it", "dispense"));
        assert!(!mentions("a cardigan", "card"));
    }

    #[test]
    fn topic_change_phrases_are_detected() {
        assert!(is_topic_change("Actually, check my balance"));
        assert!(is_topic_change("can you help me with something else"));
        assert!(!is_topic_change("my card was declined"));
    }

    #[tokio::test]
    async fn established_flow_is_sticky_without_topic_change() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let decision = router(classifier)
            .route(RouteRequest {
                text: "and what about my card",
                current_flow: Some(FlowCategory::AccountServicing),
                lock_flow: false,
                force_reroute: false,
            })
            .await;

        assert_eq!(decision.flow, Some(FlowCategory::AccountServicing));
        assert_eq!(decision.source, RouteSource::Sticky);
    }

    #[tokio::test]
    async fn topic_change_reclassifies() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let decision = router(classifier)
            .route(RouteRequest {
                text: "actually I lost my card",
                current_flow: Some(FlowCategory::AccountServicing),
                lock_flow: false,
                force_reroute: false,
            })
            .await;

        assert_eq!(decision.flow, Some(FlowCategory::CardIssues));
        assert_eq!(decision.source, RouteSource::Keyword);
    }

    #[tokio::test]
    async fn lock_flow_ignores_topic_change() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let decision = router(classifier)
            .route(RouteRequest {
                text: "wait, actually check my balance",
                current_flow: Some(FlowCategory::CardIssues),
                lock_flow: true,
                force_reroute: true,
            })
            .await;

        assert_eq!(decision.flow, Some(FlowCategory::CardIssues));
        assert_eq!(decision.source, RouteSource::Locked);
    }

    #[tokio::test]
    async fn force_reroute_bypasses_stickiness() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let decision = router(classifier)
            .route(RouteRequest {
                text: "what's my balance",
                current_flow: Some(FlowCategory::CardIssues),
                lock_flow: false,
                force_reroute: true,
            })
            .await;

        assert_eq!(decision.flow, Some(FlowCategory::AccountServicing));
    }

    #[tokio::test]
    async fn classifier_is_only_consulted_when_keywords_miss() {
        let classifier = Arc::new(ScriptedClassifier {
            answer: Some(FlowCategory::Transfers),
            ..ScriptedClassifier::default()
        });
        let router = router(classifier.clone());

        let keyword = router.route(fresh("my card is gone")).await;
        assert_eq!(keyword.source, RouteSource::Keyword);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);

        let classified = router.route(fresh("send money to my mom")).await;
        assert_eq!(classified.flow, Some(FlowCategory::Transfers));
        assert_eq!(classified.source, RouteSource::Classifier);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_classifier_answer_leaves_flow_unset() {
        let classifier = Arc::new(ScriptedClassifier::default());
        let decision = router(classifier).route(fresh("tell me a joke")).await;

        assert_eq!(decision.flow, None);
        assert_eq!(decision.source, RouteSource::Unclassified);
    }

    #[tokio::test]
    async fn classifier_failure_is_degraded_not_propagated() {
        let failing = Arc::new(ScriptedClassifier { fail: true, ..ScriptedClassifier::default() });
        let decision = router(failing).route(fresh("tell me a joke")).await;
        assert_eq!(decision.source, RouteSource::ClassifierUnavailable);
        assert_eq!(decision.flow, None);

        let slow = Arc::new(ScriptedClassifier {
            answer: Some(FlowCategory::Transfers),
            delay: Some(Duration::from_secs(5)),
            ..ScriptedClassifier::default()
        });
        let decision = router(slow).route(fresh("tell me a joke")).await;
        assert_eq!(decision.source, RouteSource::ClassifierUnavailable);
    }
}
