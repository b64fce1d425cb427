//! Queue execution.
//!
//! `PipelineExecutor` owns everything that lives for one `execute()` call:
//! the protector's span table, the optional rule trace and the metrics. The
//! compiled rules, the engine configuration and the protected patterns are
//! borrowed.
//!
//! ## Pass structure
//!
//! ```text
//! (0)  empty input            -> ""
//! (1)  line endings           -> "\n"
//! (2)  scan + reserved escape -> DocumentTraits, reserved spans
//! (3)  start
//! (4)  hide own/html/url      -> hide-safe-tags-<group> after each group
//! (5)  hide-safe-tags
//! (6)  entity decode          -> (live: nbsp -> space)
//! (7)  utf, default
//! (8)  entity restore
//! (9)  html-entities
//! (10) show own/html/url      -> show-safe-tags-<group> before each group
//! (11) end
//! (12) reserved restore, line-ending restore
//! ```
//!
//! Within a queue, inner rules run first (insertion order, live filter only),
//! then main rules (index order) that pass the locale, enabled and live
//! filters. Every rule consumes the full output of the previous one.

use std::time::Instant;

use super::config::{EngineConfig, LineEnding};
use super::entities::{self, HtmlEntityMode};
use super::metrics::{QueueMetrics, RuleStep, RunMetrics};
use super::protector::{Protector, SafeTags};
use super::registry::CompiledRules;
use super::scan::DocumentTraits;
use crate::{COMMON_LOCALE, Handler, Queue, Rule, RuleContext};

/// Output of one run.
#[derive(Debug, Clone)]
pub(crate) struct RunOutput {
    pub text: String,
    pub metrics: RunMetrics,
    pub trace: Vec<RuleStep>,
}

#[derive(Debug)]
pub(crate) struct PipelineExecutor<'a> {
    rules: &'a CompiledRules,
    config: &'a EngineConfig,
    safe_tags: &'a SafeTags,
    locale: &'a str,
    line_ending: LineEnding,
    html_entity: HtmlEntityMode,
    is_html: bool,
    trace: Option<Vec<RuleStep>>,
    metrics: RunMetrics,
}

impl<'a> PipelineExecutor<'a> {
    pub(crate) fn new(rules: &'a CompiledRules, config: &'a EngineConfig, safe_tags: &'a SafeTags) -> Self {
        PipelineExecutor {
            rules,
            config,
            safe_tags,
            locale: &config.locale,
            line_ending: config.line_ending,
            html_entity: config.html_entity,
            is_html: false,
            trace: None,
            metrics: RunMetrics::default(),
        }
    }

    /// Per-call overrides of the configured locale, line ending and entity form.
    pub(crate) fn with_overrides(
        mut self,
        locale: Option<&'a str>,
        line_ending: Option<LineEnding>,
        html_entity: Option<HtmlEntityMode>,
    ) -> Self {
        if let Some(locale) = locale {
            self.locale = locale;
        }
        if let Some(line_ending) = line_ending {
            self.line_ending = line_ending;
        }
        if let Some(html_entity) = html_entity {
            self.html_entity = html_entity;
        }
        self
    }

    /// Record every applied rule's input and output.
    pub(crate) fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    pub(crate) fn run(mut self, input: &str) -> RunOutput {
        let started = Instant::now();
        if input.is_empty() {
            return self.finish(String::new(), started);
        }

        let mut protector = Protector::new(self.safe_tags);

        let text = LineEnding::normalize(input);
        let traits = DocumentTraits::scan(&text);
        let text = if traits.contains(DocumentTraits::RESERVED) { protector.escape_reserved(&text) } else { text };
        self.is_html = traits.is_html_likely();
        self.metrics.html_likely = self.is_html;

        let text = self.run_queue(Queue::Start, text);

        let html_likely = self.is_html;
        let text = protector.hide(text, html_likely, |t, group| self.run_queue(Queue::HideSafeTagsGroup(group), t));
        self.metrics.protected_spans = protector.span_count();

        let text = self.run_queue(Queue::HideSafeTags, text);

        let mut text = if traits.contains(DocumentTraits::ENTITY) { entities::decode(&text) } else { text };
        if self.config.live {
            text = text.replace('\u{A0}', " ");
        }

        let text = self.run_queue(Queue::Utf, text);
        let text = self.run_queue(Queue::Default, text);

        let text = entities::restore(&text, &self.html_entity);
        let text = self.run_queue(Queue::HtmlEntities, text);

        let text = protector.show(text, |t, group| self.run_queue(Queue::ShowSafeTagsGroup(group), t));
        let text = self.run_queue(Queue::End, text);

        let text = protector.restore_reserved(&text);
        let text = self.line_ending.apply(&text);

        self.finish(text, started)
    }

    fn finish(mut self, text: String, started: Instant) -> RunOutput {
        self.metrics.total = started.elapsed();
        RunOutput { text, metrics: self.metrics, trace: self.trace.unwrap_or_default() }
    }

    fn is_active(&self, rule: &Rule) -> bool {
        let locale = rule.name.locale();
        (locale == COMMON_LOCALE || locale == self.locale)
            && self.config.is_enabled(rule.name.full())
            && rule.live.allows(self.config.live)
    }

    fn run_queue(&mut self, queue: Queue, mut text: String) -> String {
        let started = Instant::now();
        let rules = self.rules;
        let config = self.config;
        let live = config.live;

        let steps: Vec<(&str, bool, Handler)> = rules
            .inner_rules_for(queue)
            .filter(|r| r.live.allows(live))
            .map(|r| (r.name.as_str(), true, r.handler))
            .chain(rules.rules_for(queue).filter(|r| self.is_active(r)).map(|r| (r.name.full(), false, r.handler)))
            .collect();

        let mut changed = 0;
        for &(name, inner, handler) in &steps {
            let ctx = RuleContext::new(self.locale, config.settings_for(name), self.is_html, live, config);
            let output = handler(&text, &ctx);
            let did_change = output != text;
            tracing::trace!(queue = %queue, rule = name, inner, changed = did_change, "applied rule");

            if did_change {
                changed += 1;
            }
            if let Some(trace) = self.trace.as_mut() {
                trace.push(RuleStep { queue, rule: name.to_string(), inner, input: text, output: output.clone() });
            }
            text = output;
        }

        let duration = started.elapsed();
        if !steps.is_empty() {
            tracing::debug!(queue = %queue, applied = steps.len(), changed, ?duration, "queue finished");
        }
        self.metrics.queues.push(QueueMetrics { queue, duration, rules_applied: steps.len(), changed });
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LiveAffinity, RuleIndex, RuleRegistry, SafeGroup};
    use pretty_assertions::assert_eq;

    fn tag_a(text: &str, _: &RuleContext<'_>) -> String {
        format!("{text}a")
    }

    fn tag_b(text: &str, _: &RuleContext<'_>) -> String {
        format!("{text}b")
    }

    fn tag_i(text: &str, _: &RuleContext<'_>) -> String {
        format!("{text}i")
    }

    fn tag_html(text: &str, ctx: &RuleContext<'_>) -> String {
        format!("{text}{}", if ctx.is_html { "H" } else { "T" })
    }

    fn compiled() -> CompiledRules {
        let mut registry = RuleRegistry::new();
        registry
            .register(rule! { name: "common/space/b", index: RuleIndex::from(20), handler: tag_b })
            .unwrap()
            .register(rule! { name: "common/space/a", index: RuleIndex::from(10), handler: tag_a })
            .unwrap()
            .register(rule! { name: "ru/number/ru", handler: tag_a })
            .unwrap()
            .register(rule! { name: "en/number/en", handler: tag_b })
            .unwrap()
            .register(rule! { name: "common/other/off", disabled: true, handler: tag_b })
            .unwrap()
            .register(rule! { name: "common/other/live", live: LiveAffinity::RequiredLive, handler: tag_a })
            .unwrap()
            .register(rule! { name: "common/other/html", queue: Queue::End, handler: tag_html })
            .unwrap()
            .register_inner(inner_rule! { name: "ru/first", queue: Queue::Default, handler: tag_i })
            .unwrap();
        registry.compile()
    }

    fn run(rules: &CompiledRules, config: &EngineConfig, text: &str) -> RunOutput {
        let tags = SafeTags::new();
        PipelineExecutor::new(rules, config, &tags).with_trace().run(text)
    }

    #[test]
    fn filters_by_locale_enabled_and_live() {
        let rules = compiled();
        let mut config = EngineConfig::seeded(&rules);

        config.locale = "ru".into();
        assert_eq!(run(&rules, &config, "x").text, "xiabaT");

        config.locale = "en".into();
        assert_eq!(run(&rules, &config, "x").text, "xiabbT");

        config.live = true;
        config.set_enabled(&rules, "common/other/off", true).unwrap();
        assert_eq!(run(&rules, &config, "x").text, "xiabbabT");
    }

    #[test]
    fn lower_index_feeds_higher_index() {
        let rules = compiled();
        let config = EngineConfig::seeded(&rules);
        let out = run(&rules, &config, "<p>x</p>");

        let a = out.trace.iter().find(|s| s.rule == "common/space/a").unwrap();
        let b = out.trace.iter().find(|s| s.rule == "common/space/b").unwrap();
        assert_eq!(b.input, a.output);
        assert!(out.trace[0].inner);
        assert_eq!(out.text, "<p>x</p>iabH");
        assert!(out.metrics.html_likely);
        assert_eq!(out.metrics.protected_spans, 2);
    }

    #[test]
    fn runs_every_queue_in_order() {
        let rules = compiled();
        let config = EngineConfig::seeded(&rules);
        let out = run(&rules, &config, "x");

        let queues: Vec<String> = out.metrics.queues.iter().map(|q| q.queue.to_string()).collect();
        assert_eq!(
            queues,
            [
                "start",
                "hide-safe-tags-own",
                "hide-safe-tags-html",
                "hide-safe-tags-url",
                "hide-safe-tags",
                "utf",
                "default",
                "html-entities",
                "show-safe-tags-own",
                "show-safe-tags-html",
                "show-safe-tags-url",
                "end",
            ]
        );
        assert_eq!(out.metrics.queue(Queue::Default).unwrap().rules_applied, 3);
        assert_eq!(out.metrics.queue(Queue::ShowSafeTagsGroup(SafeGroup::Url)).unwrap().rules_applied, 0);
        assert_eq!(out.metrics.rules_applied(), 4);
    }

    #[test]
    fn empty_input_runs_nothing() {
        let rules = compiled();
        let config = EngineConfig::seeded(&rules);
        let out = run(&rules, &config, "");
        assert_eq!(out.text, "");
        assert!(out.trace.is_empty());
        assert!(out.metrics.queues.is_empty());
    }

    #[test]
    fn overrides_apply_per_call() {
        let rules = compiled();
        let config = EngineConfig::seeded(&rules);
        let tags = SafeTags::new();
        let out = PipelineExecutor::new(&rules, &config, &tags)
            .with_overrides(Some("ru"), Some(LineEnding::CrLf), None)
            .run("x\ny");
        assert_eq!(out.text, "x\r\nyiabaT");
    }
}
