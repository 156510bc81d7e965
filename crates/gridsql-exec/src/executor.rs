//! Runs one plan over several fragments on a bounded set of worker threads.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use gridsql_core::config::ExecConfig;
use gridsql_core::hash::Hash256;
use gridsql_core::types::Row;
use gridsql_plan::{
    decode_plan, encode_plan, plan_fingerprint, CacheStats, DecodeLimits, PhysicalNode, PlanCache,
};

use crate::context::ExecContext;
use crate::error::{ExecError, Result};
use crate::fragment::Fragment;

/// A decoded, validated plan together with its wire bytes.
#[derive(Debug)]
pub struct PreparedPlan {
    plan: PhysicalNode,
    bytes: Bytes,
    fingerprint: Hash256,
}

impl PreparedPlan {
    pub fn new(plan: PhysicalNode) -> Self {
        let bytes = encode_plan(&plan);
        let fingerprint = plan_fingerprint(&plan);
        Self {
            plan,
            bytes,
            fingerprint,
        }
    }

    pub fn plan(&self) -> &PhysicalNode {
        &self.plan
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn fingerprint(&self) -> Hash256 {
        self.fingerprint
    }
}

pub struct FragmentExecutor {
    config: ExecConfig,
    limits: DecodeLimits,
    cache: PlanCache<PreparedPlan>,
}

impl FragmentExecutor {
    pub fn new(config: ExecConfig) -> Self {
        Self {
            limits: DecodeLimits::from_config(&config),
            cache: PlanCache::new(config.plan_cache_capacity),
            config,
        }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Decode plan bytes received from the coordinator. Structurally equal
    /// plans share one cached [`PreparedPlan`].
    pub fn prepare(&self, bytes: Bytes) -> Result<Arc<PreparedPlan>> {
        let plan = decode_plan(bytes, &self.limits)?;
        self.cache
            .get_or_insert_with(&plan, || Ok::<_, ExecError>(PreparedPlan::new(plan.clone())))
    }

    /// Run one fragment per context. Each fragment decodes and compiles its
    /// own copy of the plan. Results are returned in context order; a failing
    /// fragment does not affect the others.
    pub fn run(&self, plan: &PreparedPlan, contexts: Vec<ExecContext>) -> Vec<Result<Vec<Row>>> {
        let total = contexts.len();
        let workers = self.config.max_parallel_fragments.max(1).min(total);
        tracing::debug!(
            plan = %plan.fingerprint().short(),
            fragments = total,
            workers,
            "running fragments"
        );

        let queue: Mutex<VecDeque<(usize, ExecContext)>> =
            Mutex::new(contexts.into_iter().enumerate().collect());
        let results: Mutex<Vec<Option<Result<Vec<Row>>>>> =
            Mutex::new((0..total).map(|_| None).collect());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let Some((idx, ctx)) = queue.lock().pop_front() else {
                        break;
                    };
                    let outcome = self.run_one(plan.bytes(), ctx);
                    results.lock()[idx] = Some(outcome);
                });
            }
        });

        results
            .into_inner()
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(ExecError::Compile("fragment never ran".into()))))
            .collect()
    }

    fn run_one(&self, bytes: &Bytes, ctx: ExecContext) -> Result<Vec<Row>> {
        let plan = decode_plan(bytes.clone(), &self.limits)?;
        Fragment::compile(&plan, ctx)?.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRowSource;
    use gridsql_core::id::FragmentId;
    use gridsql_core::row;
    use gridsql_plan::AggregateExpression;

    fn source() -> Arc<MemoryRowSource> {
        Arc::new(
            MemoryRowSource::new()
                .with_partition("t", 0, vec![row!["a", 1], row!["b", 2]])
                .with_partition("t", 1, vec![row!["a", 3]])
                .with_partition("t", 2, vec![row!["c", 4]]),
        )
    }

    #[test]
    fn test_fragments_run_independently() {
        let cfg = ExecConfig {
            max_parallel_fragments: 2,
            ..ExecConfig::default()
        };
        let exec = FragmentExecutor::new(cfg.clone());
        let plan = PhysicalNode::aggregate(
            PhysicalNode::scan("t", vec![], None).unwrap(),
            vec![0],
            vec![AggregateExpression::count_star()],
            0,
        )
        .unwrap();
        let prepared = exec.prepare(encode_plan(&plan)).unwrap();

        let src = source();
        let contexts = (0..3u32)
            .map(|p| {
                ExecContext::new(FragmentId::new(p as u64), src.clone(), cfg.clone())
                    .with_partitions(vec![p])
            })
            .collect();
        let results = exec.run(&prepared, contexts);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 2);
        assert_eq!(results[1].as_ref().unwrap(), &vec![row!["a", 1i64]]);
        assert_eq!(results[2].as_ref().unwrap(), &vec![row!["c", 1i64]]);
    }

    #[test]
    fn test_one_failure_does_not_spoil_others() {
        let cfg = ExecConfig::default();
        let exec = FragmentExecutor::new(cfg.clone());
        let plan = PhysicalNode::scan("t", vec![], None).unwrap();
        let prepared = exec.prepare(encode_plan(&plan)).unwrap();
        let empty: Arc<MemoryRowSource> = Arc::new(MemoryRowSource::new());
        let contexts = vec![
            ExecContext::new(FragmentId::new(0), source(), cfg.clone()),
            ExecContext::new(FragmentId::new(1), empty, cfg),
        ];
        let results = exec.run(&prepared, contexts);
        assert_eq!(results[0].as_ref().unwrap().len(), 4);
        assert!(matches!(results[1], Err(ExecError::UnknownSource(_))));
    }

    #[test]
    fn test_prepare_hits_cache_for_equal_plans() {
        let exec = FragmentExecutor::new(ExecConfig::default());
        let plan = PhysicalNode::scan("t", vec![1], None).unwrap();
        let a = exec.prepare(encode_plan(&plan)).unwrap();
        let b = exec.prepare(encode_plan(&plan)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(exec.cache_stats().hits, 1);
    }

    #[test]
    fn test_prepare_rejects_garbage() {
        let exec = FragmentExecutor::new(ExecConfig::default());
        assert!(matches!(
            exec.prepare(Bytes::from_static(&[0xff, 0, 0])),
            Err(ExecError::Plan(_))
        ));
    }
}
