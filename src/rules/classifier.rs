//! Classifier (component E). Strict first-match precedence over a rule
//! snapshot: ads, then international, then domestic, then the default
//! domestic-first policy whose intl retry-and-relabel is the pipeline's
//! job (§4.F step 5), not this component's — the classifier only ever
//! names the *first* route to try.

use crate::forwarder::Upstream;

use super::store::RuleSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    China,
    Intl,
    AdGuard,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::China => "china",
            Route::Intl => "intl",
            Route::AdGuard => "adguard",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub route: Route,
    pub upstreams: Vec<Upstream>,
    /// True only for the unmatched (4th precedence) case: the pipeline
    /// retries against `intl` and relabels the route on domestic
    /// failure or an empty answer (§4.E item 4, §4.F step 5).
    pub is_default: bool,
}

pub struct Classifier {
    pub domestic: Vec<Upstream>,
    pub intl: Vec<Upstream>,
    pub ads_sink: Option<Upstream>,
}

impl Classifier {
    pub fn new(domestic: Vec<Upstream>, intl: Vec<Upstream>, ads_sink: Option<Upstream>) -> Self {
        Self {
            domestic,
            intl,
            ads_sink,
        }
    }

    /// `name` must already be normalized. Precedence is strict: the first
    /// matching rule wins, even if the name also matches a later category.
    pub fn classify(&self, name: &str, snapshot: &RuleSnapshot) -> Decision {
        if let Some(sink) = self.ads_sink {
            if super::matcher::matches(name, &snapshot.ads) {
                return Decision {
                    route: Route::AdGuard,
                    upstreams: vec![sink],
                    is_default: false,
                };
            }
        }

        if super::matcher::matches(name, &snapshot.international) {
            return Decision {
                route: Route::Intl,
                upstreams: self.intl.clone(),
                is_default: false,
            };
        }

        if super::matcher::matches(name, &snapshot.domestic) {
            return Decision {
                route: Route::China,
                upstreams: self.domestic.clone(),
                is_default: false,
            };
        }

        // Default: try domestic first. The pipeline retries against intl
        // and relabels the route on domestic failure or an empty answer.
        Decision {
            route: Route::China,
            upstreams: self.domestic.clone(),
            is_default: true,
        }
    }

    pub fn intl_pool(&self) -> &[Upstream] {
        &self.intl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::matcher::build_rule_set;

    fn upstream(addr: &str) -> Upstream {
        Upstream::parse(addr).unwrap()
    }

    fn snapshot(domestic: &[&str], international: &[&str], ads: &[&str]) -> RuleSnapshot {
        RuleSnapshot {
            domestic: build_rule_set(domestic.iter().copied()),
            international: build_rule_set(international.iter().copied()),
            ads: build_rule_set(ads.iter().copied()),
            version: 1,
        }
    }

    #[test]
    fn ads_beats_domestic() {
        let classifier = Classifier::new(
            vec![upstream("1.1.1.1:53")],
            vec![upstream("8.8.8.8:53")],
            Some(upstream("9.9.9.9:53")),
        );
        let snap = snapshot(&["example.com"], &[], &["example.com"]);
        let decision = classifier.classify("example.com", &snap);
        assert_eq!(decision.route, Route::AdGuard);
    }

    #[test]
    fn intl_beats_domestic() {
        let classifier = Classifier::new(
            vec![upstream("1.1.1.1:53")],
            vec![upstream("8.8.8.8:53")],
            None,
        );
        let snap = snapshot(&["example.com"], &["example.com"], &[]);
        let decision = classifier.classify("example.com", &snap);
        assert_eq!(decision.route, Route::Intl);
    }

    #[test]
    fn domestic_match_routes_china() {
        let classifier = Classifier::new(
            vec![upstream("1.1.1.1:53")],
            vec![upstream("8.8.8.8:53")],
            None,
        );
        let snap = snapshot(&["baidu.com"], &[], &[]);
        let decision = classifier.classify("baidu.com", &snap);
        assert_eq!(decision.route, Route::China);
    }

    #[test]
    fn default_route_is_china_first() {
        let classifier = Classifier::new(
            vec![upstream("1.1.1.1:53")],
            vec![upstream("8.8.8.8:53")],
            None,
        );
        let snap = snapshot(&[], &[], &[]);
        let decision = classifier.classify("unknown.tld", &snap);
        assert_eq!(decision.route, Route::China);
        assert_eq!(decision.upstreams.len(), 1);
        assert!(decision.is_default);
    }

    #[test]
    fn explicit_domestic_match_is_not_the_default_case() {
        let classifier = Classifier::new(
            vec![upstream("1.1.1.1:53")],
            vec![upstream("8.8.8.8:53")],
            None,
        );
        let snap = snapshot(&["baidu.com"], &[], &[]);
        let decision = classifier.classify("baidu.com", &snap);
        assert!(!decision.is_default);
    }
}
