// ============================================================================
// Soft Delete Listener
// ============================================================================
//
// Applies onSoftDelete policies to the rows related to an entity that is
// about to be soft-deleted.
//
// Nested cascades run on an explicit work stack instead of re-dispatching the
// lifecycle event. A cascaded row is pushed as `Enter` then `Mark`, so its own
// dependents are settled before it is marked. A row reached again through a
// second path is entered where it is found; the frames queued for it earlier
// are dropped once it is marked.
//
// ============================================================================

pub mod discovery;
pub mod events;
pub mod execution;
pub mod report;
pub mod resolution;

pub use discovery::{RelationPolicy, discover};
pub use events::{
    EventKind, EventLog, EventManager, LifecycleEvent, LifecycleListener, SoftDeleteObserver,
};
pub use execution::{CascadeProgress, CascadeStep};
pub use report::{CascadeReport, FieldChange};
pub use resolution::{Resolution, Side, resolve, target_side};

use std::sync::Arc;
use tracing::{Level, event, info_span};

use crate::config::CascadeConfig;
use crate::core::{CascadeError, EntityKey, Result, Value};
use crate::mapping::{Policy, Registry};
use crate::transaction::Session;

#[derive(Debug)]
enum Frame {
    Enter { key: EntityKey, depth: usize },
    Mark { key: EntityKey },
}

/// Policy applied to one batch of referencing rows
enum Action {
    SetNull,
    Redirect(Value),
    Cascade,
}

/// Cascade listener registered on a [`Session`].
#[derive(Debug, Clone)]
pub struct SoftDeleteListener {
    config: CascadeConfig,
}

impl SoftDeleteListener {
    /// Creates the listener, validating every declared policy of `registry`
    /// first when `validate_on_startup` is set.
    pub fn new(registry: &Registry, config: CascadeConfig) -> Result<Self> {
        if config.validate_on_startup {
            let relations = discover(registry)?;
            event!(
                Level::DEBUG,
                relations = relations.len(),
                "onSoftDelete declarations validated"
            );
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Runs the cascade for `root`. The root itself is left for the caller to
    /// mark.
    pub fn process(&self, session: &mut Session, root: &EntityKey) -> Result<CascadeReport> {
        let span = info_span!("cascade.process", root = %root);
        let _enter = span.enter();

        let registry = Arc::clone(session.registry());
        let relations = discover(&registry)?;

        let mut report = CascadeReport::new(root.clone());
        let mut progress = CascadeProgress::new();
        let mut stack = vec![Frame::Enter {
            key: root.clone(),
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter { key, .. } | Frame::Mark { key } if progress.is_marked(&key) => {}
                Frame::Enter { key, depth } => {
                    if depth > self.config.max_depth {
                        return Err(CascadeError::CascadeDepthExceeded { depth, entity: key });
                    }
                    report.max_depth = report.max_depth.max(depth);
                    if depth > 0 {
                        session.dispatch(EventKind::PreSoftDelete, &key);
                    }
                    progress.enter(key.clone());

                    let follow_ups =
                        self.enter(session, &registry, &relations, &key, &progress, &mut report)?;
                    for child in follow_ups.into_iter().rev() {
                        stack.push(Frame::Mark { key: child.clone() });
                        stack.push(Frame::Enter {
                            key: child,
                            depth: depth + 1,
                        });
                    }
                }
                Frame::Mark { key } => {
                    let accessor = registry
                        .entity(&key.entity)?
                        .soft_delete_accessor()?
                        .ok_or_else(|| CascadeError::NotSoftDeleteable(key.entity.clone()))?;
                    session.mark_soft_deleted(&key, accessor)?;
                    progress.mark(&key);
                    session.dispatch(EventKind::PostSoftDelete, &key);
                    event!(Level::DEBUG, entity = %key, "cascaded soft delete");
                    report.soft_deleted.push(key);
                }
            }
        }

        event!(
            Level::INFO,
            nullified = report.nullified.len(),
            redirected = report.redirected.len(),
            soft_deleted = report.soft_deleted.len(),
            removed = report.removed.len(),
            unlinked = report.unlinked,
            "cascade finished"
        );
        Ok(report)
    }

    /// Settles every relation pointing at `key` and returns the rows that
    /// need a nested soft delete, in resolution order.
    fn enter(
        &self,
        session: &mut Session,
        registry: &Registry,
        relations: &[RelationPolicy],
        key: &EntityKey,
        progress: &CascadeProgress,
        report: &mut CascadeReport,
    ) -> Result<Vec<EntityKey>> {
        let mut referencing = Vec::new();
        let mut collections = Vec::new();
        for relation in relations {
            match target_side(registry, relation, &key.entity) {
                Some(Side::Referencing) => referencing.push(relation),
                Some(_) => collections.push(relation),
                None => {}
            }
        }

        // Lookups first so a SUCCESSOR misconfiguration fails before any write.
        let mut successor: Option<Value> = None;
        let mut batches = Vec::new();
        for relation in referencing {
            let rows = match resolve(session, relation, key)? {
                Resolution::Rows(rows) if !rows.is_empty() => rows,
                _ => continue,
            };
            let action = match relation.policy {
                Policy::SetNull => Action::SetNull,
                Policy::Cascade => Action::Cascade,
                Policy::Successor => match &successor {
                    Some(value) => Action::Redirect(value.clone()),
                    None => {
                        let value = execution::successor_value(session, key)?;
                        successor = Some(value.clone());
                        Action::Redirect(value)
                    }
                },
            };
            batches.push((relation, rows, action));
        }

        for relation in collections {
            if let Resolution::Unlinked(count) = resolve(session, relation, key)? {
                report.unlinked += count;
            }
        }

        let mut follow_ups = Vec::new();
        for (relation, rows, action) in batches {
            for row in rows {
                match &action {
                    Action::SetNull => {
                        report.nullified.push(execution::set_null(session, relation, &row)?);
                    }
                    Action::Redirect(value) => {
                        report
                            .redirected
                            .push(execution::redirect(session, relation, &row, value)?);
                    }
                    Action::Cascade => match execution::cascade(session, &row, progress)? {
                        CascadeStep::SoftDelete(child) | CascadeStep::InProgress(child)
                            if follow_ups.contains(&child) => {}
                        CascadeStep::SoftDelete(child) => follow_ups.push(child),
                        CascadeStep::Removed(child) => report.removed.push(child),
                        CascadeStep::AlreadyDeleted(child) => report.skipped.push(child),
                        CascadeStep::Settled(_) => {}
                        CascadeStep::InProgress(child) if self.config.detect_cycles => {
                            event!(
                                Level::WARN,
                                entity = %child,
                                "cascade cycle, row is already being soft-deleted"
                            );
                            report.skipped.push(child);
                        }
                        CascadeStep::InProgress(child) => follow_ups.push(child),
                    },
                }
            }
        }

        Ok(follow_ups)
    }
}

impl LifecycleListener for SoftDeleteListener {
    fn pre_soft_delete(&self, session: &mut Session, entity: &EntityKey) -> Result<()> {
        let report = self.process(session, entity)?;
        session.record_report(report);
        Ok(())
    }
}
