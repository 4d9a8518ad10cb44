//! Engine: the single orchestrator wiring every pipeline stage - sanitize,
//! safety, lexical extraction, validation, EXPLAIN, plan parsing, metrics,
//! scoring, rules, scalability, and (for [`Engine::diagnose`]) the eight
//! deep analyzers - into one call per statement.
//!
//! A rejected statement is a normal [`EngineOutcome::Rejected`] value,
//! never a Rust error or thrown exception. An `AppError` is reserved for
//! genuine infrastructure failure (driver connection loss, baseline I/O)
//! that the caller cannot recover from by fixing the SQL.

use std::sync::Arc;

use chrono::Utc;
use compact_str::CompactString;

use crate::{
    analyzers::{
        cardinality, concurrency, confidence, hypothetical_index, index_synthesis, memory, regression, scalability
    },
    baseline::{self, BaselineStore},
    config::Config,
    consistency,
    driver::Driver,
    error::AppResult,
    explain::{self, ExplainResult},
    lexical::{self, LexicalFacts, SqlDialect},
    metrics::{self, Metrics},
    plan,
    report::{
        AnalysisMode, AnalysisResult, AnalyzerOutputs, DiagnosticReport, EngineOutcome, FailureStage, Report,
        ValidationFailureReport
    },
    rules::RuleRegistry,
    safety,
    sanitizer,
    scoring::{self, Scores},
    validator
};

/// Shared, confirmed-valid state produced by the pipeline stages every
/// `diagnose`/`analyze_sql` call runs, before the two entry points diverge.
struct PipelineStage {
    sanitized:       String,
    facts:           LexicalFacts,
    metrics:         Metrics,
    plan_text:       String,
    scores:          Scores,
    grade:           char,
    rule_findings:   Vec<crate::report::Finding>,
    scalability:     crate::analyzers::scalability::ScalabilityProjection,
    is_plain_select: bool
}

enum PipelineOutcome {
    Ready(PipelineStage),
    Rejected(ValidationFailureReport)
}

/// Owns one driver connection, the config-derived rule registry, and
/// (when regression detection is enabled) a baseline store. Stateless
/// beyond that, and safe to share across concurrent `diagnose` calls -
/// every collaborator it drives is either pure or owns its own pool.
pub struct Engine {
    driver:      Arc<dyn Driver>,
    config:      Config,
    rules:       RuleRegistry,
    baseline:    Option<BaselineStore>,
    dialect:     SqlDialect,
    environment: CompactString
}

impl Engine {
    pub fn new(driver: Arc<dyn Driver>, config: Config, dialect: SqlDialect, environment: impl Into<CompactString>) -> AppResult<Self> {
        let rules = RuleRegistry::with_config(&config.rules);
        let baseline = if config.regression.enabled {
            Some(BaselineStore::new(config.regression.storage_path.clone(), config.regression.max_history)?)
        } else {
            None
        };

        Ok(Self {
            driver,
            config,
            rules,
            baseline,
            dialect,
            environment: environment.into()
        })
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shallow pass: validation, EXPLAIN, scoring, rules, and the
    /// scalability projection, with no deep analyzer involved. Cheaper
    /// than [`Engine::diagnose`] when a caller only needs the graded score
    /// (e.g. a pre-commit hook scanning many statements).
    pub async fn analyze_sql(&self, sql: &str) -> AppResult<EngineOutcome> {
        let stage = match self.run_pipeline(sql).await? {
            PipelineOutcome::Rejected(failure) => return Ok(EngineOutcome::Rejected(failure)),
            PipelineOutcome::Ready(stage) => stage
        };

        let report = self.build_report(sql, stage);
        let diagnostic = DiagnosticReport::new(report, AnalyzerOutputs::default(), Vec::new());
        Ok(EngineOutcome::Report(diagnostic))
    }

    /// Full pass: everything `analyze_sql` does, plus every deep analyzer
    /// and the cross-stage consistency check.
    pub async fn diagnose(&self, sql: &str) -> AppResult<EngineOutcome> {
        let stage = match self.run_pipeline(sql).await? {
            PipelineOutcome::Rejected(failure) => return Ok(EngineOutcome::Rejected(failure)),
            PipelineOutcome::Ready(stage) => stage
        };

        let cardinality_report = cardinality::analyze(
            &stage.metrics,
            self.config.cardinality_drift.warning_threshold,
            self.config.cardinality_drift.critical_threshold
        );

        let anti_pattern_findings =
            crate::analyzers::anti_patterns::analyze(&stage.facts, &stage.metrics, &self.config.anti_patterns);

        let index_proposals = index_synthesis::analyze(&stage.facts, &self.config.index_synthesis);

        let has_subquery = stage.facts.has_subquery || stage.facts.has_correlated_subquery;
        let concurrency_report = concurrency::analyze(&stage.metrics, stage.is_plain_select, has_subquery);

        let memory_report = memory::analyze(&stage.metrics, &self.config.memory_pressure);

        let hypothetical_report = if index_proposals.is_empty() {
            None
        } else {
            match hypothetical_index::analyze(
                self.driver.as_ref(),
                &stage.sanitized,
                &index_proposals,
                &self.config.hypothetical_index,
                &self.environment
            )
            .await
            {
                Ok(report) => report,
                Err(error) => {
                    tracing::warn!(%error, "hypothetical index analyzer failed, continuing without it");
                    None
                }
            }
        };

        let query_hash = baseline::query_hash(&stage.sanitized);
        let regression_report = match &self.baseline {
            Some(store) => match regression::analyze(
                store,
                &query_hash,
                &stage.metrics,
                stage.scores.composite,
                stage.grade,
                &self.config.regression
            ) {
                Ok(report) => Some(report),
                Err(error) => {
                    tracing::warn!(%error, "regression analyzer failed, continuing without it");
                    None
                }
            },
            None => None
        };
        let regression_baseline_ms = regression_report.as_ref().and_then(|r| r.baseline_execution_time_ms);

        let capabilities = self.driver.capabilities().await.unwrap_or_default();
        // A regression baseline observing the same access path as the
        // current run is as close to "plan stability" as this pipeline can
        // measure without keeping its own plan-shape history.
        let plan_stability = match (&regression_report, stage.metrics.is_index_backed) {
            (Some(_), false) => 0.6,
            _ => 1.0
        };
        let confidence_report =
            confidence::analyze(&stage.metrics, cardinality_report.composite_drift, capabilities, plan_stability);

        let mut all_findings = stage.rule_findings.clone();
        all_findings.extend(cardinality_report.findings.clone());
        all_findings.extend(anti_pattern_findings.clone());
        all_findings.extend(concurrency_report.findings.clone());
        all_findings.extend(memory_report.findings.clone());
        if let Some(h) = &hypothetical_report {
            all_findings.extend(h.findings.clone());
        }
        if let Some(r) = &regression_report {
            all_findings.extend(r.findings.clone());
        }
        all_findings.extend(confidence_report.findings.clone());

        let consistency_violations = consistency::validate(
            &stage.metrics,
            &all_findings,
            Some(&concurrency_report),
            stage.is_plain_select,
            regression_baseline_ms
        );
        for violation in &consistency_violations {
            tracing::warn!(rule = violation.rule, message = %violation.message, "consistency violation");
        }

        let scalability = stage.scalability.clone();
        let mut report = self.build_report(sql, stage);
        report.result.findings = all_findings;
        report.scalability = scalability;
        // `build_report`'s `passed`/`recommendations` were computed from the
        // rule findings alone, before the deep-analyzer findings above were
        // merged in - recompute both now that `report.result.findings` holds
        // the full set, so a Warning/Critical raised only by an analyzer
        // (confidence, regression, hypothetical-index) still gates CI.
        report.passed = self.passed_gate(&report.result.findings, report.grade);
        report.recommendations = report.result.findings.iter().filter_map(|f| f.recommendation.clone()).collect();

        let analyzers = AnalyzerOutputs {
            cardinality_drift:  Some(cardinality_report),
            anti_patterns:      Some(anti_pattern_findings),
            index_synthesis:    Some(index_proposals),
            hypothetical_index: hypothetical_report,
            regression:         regression_report,
            concurrency:        Some(concurrency_report),
            memory_pressure:    Some(memory_report),
            confidence:         Some(confidence_report)
        };

        let diagnostic = DiagnosticReport::new(report, analyzers, consistency_violations);
        Ok(EngineOutcome::Report(diagnostic))
    }

    /// Runs every stage shared by `analyze_sql` and `diagnose`, stopping at
    /// the first rejection.
    async fn run_pipeline(&self, sql: &str) -> AppResult<PipelineOutcome> {
        let sanitized = sanitizer::sanitize(sql);

        if let Err(unsafe_query) = safety::validate(&sanitized) {
            let failure = ValidationFailureReport::new(FailureStage::Safety, "ERROR - Unsafe Statement", unsafe_query.reason)
                .with_recommendation("Only read-only SELECT/WITH/SHOW/EXPLAIN/DESCRIBE statements can be analyzed");
            return Ok(PipelineOutcome::Rejected(failure));
        }

        let facts = match lexical::extract(&sanitized, self.dialect) {
            Ok(facts) => facts,
            Err(error) => {
                let failure = ValidationFailureReport::new(FailureStage::SyntaxValidation, "ERROR - Invalid Syntax", error.to_string());
                return Ok(PipelineOutcome::Rejected(failure));
            }
        };

        if let Some(failure) = validator::validate(&sanitized, &facts, self.driver.as_ref()).await? {
            return Ok(PipelineOutcome::Rejected(failure));
        }

        let (plan_text, _rows) = match explain::execute(&sanitized, self.driver.as_ref()).await? {
            ExplainResult::Failure(failure) => return Ok(PipelineOutcome::Rejected(failure)),
            ExplainResult::Success { plan_text, rows } => (plan_text, rows)
        };

        let Some(root) = plan::parse(&plan_text) else {
            let failure = ValidationFailureReport::new(
                FailureStage::Explain,
                "ERROR - Unparseable Plan",
                "EXPLAIN ANALYZE output could not be parsed into a plan tree"
            )
            .with_recommendation("Re-run EXPLAIN ANALYZE manually to confirm the driver returned a well-formed plan");
            return Ok(PipelineOutcome::Rejected(failure));
        };

        let metrics = metrics::extract(&root, &plan_text, facts.is_intentional_full_scan);

        let weights = self.config.scoring.weights;
        let thresholds = &self.config.scoring.grade_thresholds;
        let scores = scoring::score(&metrics, weights, thresholds);
        let grade = scoring::grade_for_score(scores.composite, Some(thresholds));

        let rule_findings = self.rules.evaluate(&metrics);
        let scalability = scalability::estimate(&metrics, &self.config.projection.targets);
        let is_plain_select = !safety::is_locking_read(&sanitized);

        Ok(PipelineOutcome::Ready(PipelineStage {
            sanitized,
            facts,
            metrics,
            plan_text,
            scores,
            grade,
            rule_findings,
            scalability,
            is_plain_select
        }))
    }

    /// CI pass/fail gate shared by `build_report` (rule findings only) and
    /// `diagnose` (rule findings plus every deep-analyzer finding).
    fn passed_gate(&self, findings: &[crate::report::Finding], grade: char) -> bool {
        let has_critical = findings.iter().any(|f| f.severity == crate::report::Severity::Critical);
        let has_warning = findings.iter().any(|f| f.severity == crate::report::Severity::Warning);
        let below_grade_floor = self
            .config
            .ci
            .fail_on_grade_below
            .is_some_and(|floor| grade_rank(grade) < grade_rank(floor));
        !has_critical && !below_grade_floor && !(self.config.ci.fail_on_warning && has_warning)
    }

    fn build_report(&self, sql: &str, stage: PipelineStage) -> Report {
        let passed = self.passed_gate(&stage.rule_findings, stage.grade);

        let execution_time_ms = stage.metrics.execution_time_ms;
        let result = AnalysisResult {
            sql: sql.to_string(),
            driver: CompactString::from(self.driver.name()),
            plan_text: stage.plan_text,
            metrics: stage.metrics,
            scores: stage.scores.clone(),
            findings: stage.rule_findings,
            execution_time_ms
        };

        let recommendations = result.findings.iter().filter_map(|f| f.recommendation.clone()).collect();

        Report {
            composite_score: result.scores.composite,
            grade: stage.grade,
            passed,
            result,
            recommendations,
            scalability: stage.scalability,
            analyzed_at: Utc::now(),
            mode: AnalysisMode::Sql
        }
    }
}

/// Ordinal rank for grade-floor comparisons: `A` is best (rank 4), `F`
/// worst (rank 0).
fn grade_rank(grade: char) -> u8 {
    match grade.to_ascii_uppercase() {
        'A' => 4,
        'B' => 3,
        'C' => 2,
        'D' => 1,
        _ => 0
    }
}
