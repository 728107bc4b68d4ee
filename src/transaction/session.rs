use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{Level, event, info_span};

use super::unit_of_work::{FlushSummary, UnitOfWork};
use crate::config::CascadeConfig;
use crate::core::{CascadeError, EntityKey, Result, Row, Value};
use crate::listener::{
    CascadeReport, EventKind, EventManager, LifecycleListener, SoftDeleteListener,
    SoftDeleteObserver,
};
use crate::mapping::{FieldAccessor, Registry};
use crate::storage::EntityStore;

/// A unit of work bound to one store, plus the lifecycle hooks that run on
/// soft delete.
pub struct Session {
    registry: Arc<Registry>,
    store: Box<dyn EntityStore>,
    uow: UnitOfWork,
    events: EventManager,
    listeners: Vec<Arc<dyn LifecycleListener>>,
    reports: Vec<CascadeReport>,
}

impl Session {
    pub fn new(registry: Arc<Registry>, store: impl EntityStore + 'static) -> Self {
        Self {
            registry,
            store: Box::new(store),
            uow: UnitOfWork::new(),
            events: EventManager::new(),
            listeners: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// Session with the cascade listener registered.
    pub fn with_cascade(
        registry: Arc<Registry>,
        store: impl EntityStore + 'static,
        config: CascadeConfig,
    ) -> Result<Self> {
        let listener = SoftDeleteListener::new(&registry, config)?;
        let mut session = Self::new(registry, store);
        session.add_listener(Arc::new(listener));
        Ok(session)
    }

    pub fn add_listener(&mut self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn subscribe(&mut self, observer: Arc<dyn SoftDeleteObserver>) {
        self.events.subscribe(observer);
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    pub fn unit_of_work_mut(&mut self) -> &mut UnitOfWork {
        &mut self.uow
    }

    /// Cascade reports produced by soft deletes in this session
    pub fn reports(&self) -> &[CascadeReport] {
        &self.reports
    }

    pub(crate) fn record_report(&mut self, report: CascadeReport) {
        self.reports.push(report);
    }

    pub(crate) fn dispatch(&self, kind: EventKind, entity: &EntityKey) {
        self.events.dispatch(kind, entity);
    }

    /// Store a new row and start tracking it.
    pub fn insert<'a, I>(&mut self, key: EntityKey, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let row = self.registry.entity(&key.entity)?.row(values)?;
        self.store.insert(key.clone(), row.clone())?;
        self.uow.manage(key, row);
        Ok(())
    }

    /// Managed row for `key`, loaded from the store on first access.
    pub fn load(&mut self, key: &EntityKey) -> Result<&Row> {
        self.ensure_managed(key)?;
        self.uow
            .get(key)
            .ok_or_else(|| CascadeError::EntityNotFound(key.clone()))
    }

    pub fn load_mut(&mut self, key: &EntityKey) -> Result<&mut Row> {
        self.ensure_managed(key)?;
        self.uow
            .get_mut(key)
            .ok_or_else(|| CascadeError::EntityNotFound(key.clone()))
    }

    fn ensure_managed(&mut self, key: &EntityKey) -> Result<()> {
        if !self.uow.is_managed(key) {
            let row = self
                .store
                .load(key)?
                .ok_or_else(|| CascadeError::EntityNotFound(key.clone()))?;
            self.uow.manage(key.clone(), row);
        }
        Ok(())
    }

    /// Current value of a field on a managed row.
    pub fn value(&mut self, key: &EntityKey, field: &str) -> Result<Value> {
        let registry = Arc::clone(&self.registry);
        let accessor = registry.entity(&key.entity)?.accessor(field)?;
        let row = self.load(key)?;
        Ok(accessor.get(row)?.clone())
    }

    /// Rows of `accessor.entity()` whose field references `target`, as seen
    /// by this session (store rows plus pending in-memory state).
    pub fn find_referencing(
        &mut self,
        accessor: &FieldAccessor,
        target: &EntityKey,
    ) -> Result<Vec<EntityKey>> {
        let candidates = self.store.find_by(accessor, target)?;
        self.filter_managed(accessor, candidates, |value| value.as_ref_key() == Some(target))
    }

    /// Rows of `accessor.entity()` whose collection field contains `member`.
    pub fn find_collection_owners(
        &mut self,
        accessor: &FieldAccessor,
        member: &EntityKey,
    ) -> Result<Vec<EntityKey>> {
        let candidates = self.store.find_members(accessor, member)?;
        self.filter_managed(accessor, candidates, |value| value.references(member))
    }

    fn filter_managed<F>(
        &mut self,
        accessor: &FieldAccessor,
        candidates: Vec<EntityKey>,
        matches: F,
    ) -> Result<Vec<EntityKey>>
    where
        F: Fn(&Value) -> bool,
    {
        let mut keys = candidates;
        keys.extend(self.uow.managed_keys_of(accessor.entity()));
        keys.sort();
        keys.dedup();

        let mut found = Vec::new();
        for key in keys {
            if self.uow.is_scheduled_for_removal(&key) {
                continue;
            }
            let row = self.load(&key)?;
            if matches(accessor.get(row)?) {
                found.push(key);
            }
        }
        Ok(found)
    }

    /// Write `value` into a managed row and register the old/new pair with
    /// both tracker paths.
    pub fn write_tracked(
        &mut self,
        key: &EntityKey,
        accessor: &FieldAccessor,
        value: Value,
    ) -> Result<Value> {
        let row = self.load_mut(key)?;
        let old = accessor.set(row, value.clone())?;
        self.uow
            .property_changed(key, accessor.field(), old.clone(), value.clone());
        self.uow
            .schedule_extra_update(key, accessor.field(), old.clone(), value);
        Ok(old)
    }

    pub(crate) fn mark_soft_deleted(
        &mut self,
        key: &EntityKey,
        accessor: &FieldAccessor,
    ) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.write_tracked(key, accessor, Value::Timestamp(now))?;
        Ok(now)
    }

    /// Soft delete `key`: run the pre-soft-delete hooks, then set its
    /// deletion timestamp.
    ///
    /// Rows that are already marked are left alone, unless their type is in
    /// hard-delete mode, in which case they are scheduled for removal. When a
    /// hook fails, the unit of work is rolled back to its state before the
    /// call.
    pub fn soft_delete(&mut self, key: &EntityKey) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity_type = registry.entity(&key.entity)?;
        let config = entity_type
            .soft_delete()
            .ok_or_else(|| CascadeError::NotSoftDeleteable(key.entity.clone()))?;
        let accessor = entity_type.accessor(&config.field)?;

        let span = info_span!("session.soft_delete", entity = %key);
        let _enter = span.enter();

        let current = accessor.get(self.load(key)?)?.clone();
        if !current.is_null() {
            if config.hard_delete {
                event!(Level::DEBUG, "already soft-deleted, scheduling removal");
                self.uow.schedule_removal(key);
            }
            return Ok(());
        }

        let savepoint = self.uow.savepoint();
        let reports = self.reports.len();
        if let Err(err) = self.run_soft_delete(key, accessor) {
            self.uow.rollback_to(savepoint);
            self.reports.truncate(reports);
            event!(Level::WARN, error = %err, "soft delete failed, pending changes rolled back");
            return Err(err);
        }
        event!(Level::DEBUG, "entity soft-deleted");
        Ok(())
    }

    fn run_soft_delete(&mut self, key: &EntityKey, accessor: &FieldAccessor) -> Result<()> {
        self.dispatch(EventKind::PreSoftDelete, key);
        for listener in self.listeners.clone() {
            listener.pre_soft_delete(self, key)?;
        }

        self.mark_soft_deleted(key, accessor)?;
        self.dispatch(EventKind::PostSoftDelete, key);
        for listener in self.listeners.clone() {
            listener.post_soft_delete(self, key)?;
        }
        Ok(())
    }

    /// Schedule a managed row for physical removal.
    pub fn remove(&mut self, key: &EntityKey) -> Result<()> {
        self.ensure_managed(key)?;
        self.uow.schedule_removal(key);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<FlushSummary> {
        self.uow.flush(self.store.as_mut())
    }
}
