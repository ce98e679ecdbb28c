//! Models: typed schemas that create and mediate access to instances
//!
//! A [`Model`] owns an ordered list of typed properties and a set of
//! indexes. Every read and write it performs goes through an explicit
//! [`Revision`]; instances hold no values of their own.
//!
//! # Extension
//!
//! A model may extend another. The child references its parent, inherits
//! its properties and indexes, and may not redeclare an inherited name.
//! Instances of the child are instances of the parent: `parent.all(rev)`
//! yields them, and parent indexes track them.
//!
//! # Mutation
//!
//! A property write is two-phase. Observers of every model in the
//! instance's lineage receive `before_set` while the old value is visible,
//! then `after_set` once the new value is written.

use crate::index::{Index, IndexKey, InstanceView, MutationObserver};
use crate::property::{Property, PropertyType};
use crate::query::Query;
use nodb_concurrency::Revision;
use nodb_core::{sequence, Error, Instance, ModelId, Result, Sequence, Value};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Declarative description of a model
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    name: String,
    parent: Option<Arc<Model>>,
    properties: Vec<Property>,
    indexes: Vec<(String, IndexKey)>,
}

impl ModelDefinition {
    /// Start a definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Extend `parent`
    pub fn extending(mut self, parent: &Arc<Model>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare a property
    pub fn property(self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.with_property(Property::new(name, ty))
    }

    /// Declare a property with a default value
    pub fn property_with_default(
        self,
        name: impl Into<String>,
        ty: PropertyType,
        default: impl Into<Value>,
    ) -> Self {
        self.with_property(Property::new(name, ty).with_default(default))
    }

    /// Declare a prepared property
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare an index
    pub fn index(mut self, name: impl Into<String>, key: impl Into<IndexKey>) -> Self {
        self.indexes.push((name.into(), key.into()));
        self
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A typed schema
pub struct Model {
    id: ModelId,
    name: String,
    parent: Option<Arc<Model>>,
    /// Own properties, in declaration order
    properties: Vec<Property>,
    /// This model first, then each ancestor
    lineage: Arc<[ModelId]>,
    /// The parent's lineage, shared by every instance this model creates
    ancestors: Arc<[ModelId]>,
    indexes: RwLock<Vec<Arc<Index>>>,
    observers: RwLock<Vec<Arc<dyn MutationObserver>>>,
    extensions: RwLock<Vec<Weak<Model>>>,
}

impl Model {
    /// Build a model from its definition
    ///
    /// # Errors
    ///
    /// - `DuplicateProperty` if a property name is declared twice or
    ///   redeclares an inherited one
    /// - `DuplicateIndex` likewise for index names
    /// - `UnknownProperty` if an index is keyed on an undeclared property
    pub fn define(definition: ModelDefinition) -> Result<Arc<Model>> {
        let ModelDefinition {
            name,
            parent,
            properties,
            indexes,
        } = definition;
        let id = ModelId::next();

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for property in &properties {
            let inherited = parent
                .as_ref()
                .map_or(false, |p| p.property(property.name()).is_some());
            if inherited || !seen.insert(property.name()) {
                return Err(Error::DuplicateProperty {
                    model: name,
                    property: property.name().to_string(),
                });
            }
        }

        let properties: Vec<Property> = properties.into_iter().map(|p| p.resolve(id)).collect();

        let ancestors = parent
            .as_ref()
            .map_or_else(|| Arc::from(Vec::new()), |p| Arc::clone(&p.lineage));
        let mut lineage = vec![id];
        lineage.extend_from_slice(&ancestors);

        let model = Arc::new(Model {
            id,
            name,
            parent,
            properties,
            lineage: Arc::from(lineage),
            ancestors,
            indexes: RwLock::new(Vec::new()),
            observers: RwLock::new(Vec::new()),
            extensions: RwLock::new(Vec::new()),
        });

        for (index_name, key) in indexes {
            model.attach_index(Index::new(index_name, id, key))?;
        }

        if let Some(parent) = &model.parent {
            parent.extensions.write().push(Arc::downgrade(&model));
        }

        debug!(
            model = %model.name,
            id = %model.id,
            properties = model.properties.len(),
            "defined model"
        );
        Ok(model)
    }

    /// Define a model extending this one
    pub fn extend(self: &Arc<Self>, definition: ModelDefinition) -> Result<Arc<Model>> {
        Model::define(definition.extending(self))
    }

    /// Model id
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model this one extends
    pub fn parent(&self) -> Option<&Arc<Model>> {
        self.parent.as_ref()
    }

    /// This model's id followed by its ancestors'
    pub fn lineage(&self) -> &[ModelId] {
        &self.lineage
    }

    /// Check if `instance` belongs to this model or one of its extensions
    pub fn is_model_of(&self, instance: &Instance) -> bool {
        instance.is_instance_of(self.id)
    }

    /// This model, then each ancestor
    fn ancestry(&self) -> impl Iterator<Item = &Model> {
        std::iter::successors(Some(self), |model| model.parent.as_deref())
    }

    /// Look up a property, own or inherited
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.ancestry()
            .flat_map(|model| model.properties.iter())
            .find(|property| property.name() == key)
    }

    /// Every property, inherited ones first
    pub fn properties(&self) -> Vec<&Property> {
        let mut chain: Vec<&Model> = self.ancestry().collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|model| model.properties.iter())
            .collect()
    }

    pub(crate) fn lookup(&self, key: &str) -> Result<&Property> {
        self.property(key).ok_or_else(|| Error::UnknownProperty {
            model: self.name.clone(),
            property: key.to_string(),
        })
    }

    /// The most derived model of `instance`
    ///
    /// `self` when the instance was created by this model, otherwise the
    /// extension that created it.
    fn model_for(self: &Arc<Self>, instance: &Instance) -> Result<Arc<Model>> {
        if instance.model_id() == self.id {
            return Ok(Arc::clone(self));
        }
        if instance.is_instance_of(self.id) {
            if let Some(model) = self.find_extension(instance.model_id()) {
                return Ok(model);
            }
        }
        Err(Error::ForeignInstance {
            model: self.name.clone(),
            instance: instance.id(),
        })
    }

    fn find_extension(&self, id: ModelId) -> Option<Arc<Model>> {
        let extensions: Vec<Arc<Model>> = self
            .extensions
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        extensions.into_iter().find_map(|model| {
            if model.id == id {
                Some(model)
            } else {
                model.find_extension(id)
            }
        })
    }

    /// Observers of this model and every ancestor
    fn chain_observers(&self) -> Vec<Arc<dyn MutationObserver>> {
        self.ancestry()
            .flat_map(|model| model.observers.read().clone())
            .collect()
    }

    /// Subscribe to create, set and delete events of this model's instances
    pub fn observe(&self, observer: Arc<dyn MutationObserver>) {
        self.observers.write().push(observer);
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Create an instance in `revision`
    ///
    /// Every declared property (inherited ones included) is initialized to
    /// the supplied value, its default, or its type's default. Collections
    /// always start empty. Nothing is written unless every value validates.
    ///
    /// # Errors
    ///
    /// - `UnknownProperty` for a key the model does not declare
    /// - `InvalidProperty` for a value its type rejects
    pub fn create<'a, I, V>(&self, revision: &Revision, values: I) -> Result<Instance>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        let mut supplied: FxHashMap<&str, Value> = FxHashMap::default();
        for (key, value) in values {
            self.lookup(key)?;
            supplied.insert(key, value.into());
        }

        let properties = self.properties();
        let mut initial = Vec::with_capacity(properties.len());
        for property in properties {
            let value = property.initial_value(supplied.remove(property.name()));
            property.check(&self.name, &value)?;
            initial.push((property.name(), value));
        }

        let instance = Instance::new(self.id, Arc::clone(&self.ancestors));
        for (key, value) in initial {
            revision.set_value_for(&instance, key, value);
        }
        revision.add(instance.clone());

        let view = InstanceView::new(revision, &instance);
        for observer in self.chain_observers() {
            observer.on_create(&view);
        }
        trace!(model = %self.name, %instance, "created instance");
        Ok(instance)
    }

    /// Create an instance with every property at its default
    pub fn create_default(&self, revision: &Revision) -> Result<Instance> {
        self.create(revision, std::iter::empty::<(&str, Value)>())
    }

    /// Read a property through `revision`
    ///
    /// The read is recorded in the revision's read set. Absent values read
    /// as `Null`.
    pub fn get(self: &Arc<Self>, revision: &Revision, instance: &Instance, key: &str) -> Result<Value> {
        let model = self.model_for(instance)?;
        model.lookup(key)?;
        Ok(revision.get_value_for(instance, key).unwrap_or_default())
    }

    /// Validate and write a property through `revision`
    ///
    /// # Errors
    ///
    /// - `UnsupportedMutation` for a collection property
    /// - `InvalidProperty` for a value its type rejects
    pub fn set(
        self: &Arc<Self>,
        revision: &Revision,
        instance: &Instance,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let model = self.model_for(instance)?;
        let property = model.lookup(key)?;
        if property.ty().is_collection() {
            return Err(Error::UnsupportedMutation {
                model: model.name.clone(),
                property: key.to_string(),
            });
        }
        let value = value.into();
        property.check(&model.name, &value)?;
        model.write(revision, instance, key, value);
        Ok(())
    }

    /// Two-phase write with observer notification
    fn write(&self, revision: &Revision, instance: &Instance, key: &str, value: Value) {
        let observers = self.chain_observers();
        let view = InstanceView::new(revision, instance);
        for observer in &observers {
            observer.before_set(&view, key);
        }
        revision.set_value_for(instance, key, value);
        for observer in &observers {
            observer.after_set(&view, key);
        }
    }

    /// The collection property `key`, or `UnsupportedMutation`
    fn collection(&self, key: &str) -> Result<&Property> {
        let property = self.lookup(key)?;
        if property.ty().is_collection() {
            Ok(property)
        } else {
            Err(Error::UnsupportedMutation {
                model: self.name.clone(),
                property: key.to_string(),
            })
        }
    }

    /// Append `member` to the collection property `key`
    ///
    /// The current list is read through `revision`, so concurrent edits of
    /// the same collection conflict at commit.
    pub fn append(
        self: &Arc<Self>,
        revision: &Revision,
        instance: &Instance,
        key: &str,
        member: &Instance,
    ) -> Result<()> {
        let model = self.model_for(instance)?;
        let property = model.collection(key)?;
        let member = Value::Instance(member.clone());
        if !property.ty().validate_member(&member) {
            return Err(Error::InvalidProperty {
                model: model.name.clone(),
                property: key.to_string(),
                expected: property.ty().expected(),
                actual: member.type_name(),
            });
        }

        let mut items = current_list(revision, instance, key);
        items.push(member);
        model.write(revision, instance, key, Value::List(items));
        Ok(())
    }

    /// Remove the first occurrence of `member` from the collection property `key`
    ///
    /// Returns whether the member was present.
    pub fn detach(
        self: &Arc<Self>,
        revision: &Revision,
        instance: &Instance,
        key: &str,
        member: &Instance,
    ) -> Result<bool> {
        let model = self.model_for(instance)?;
        model.collection(key)?;

        let mut items = current_list(revision, instance, key);
        let position = items
            .iter()
            .position(|item| item.as_instance() == Some(member));
        match position {
            Some(position) => {
                items.remove(position);
                model.write(revision, instance, key, Value::List(items));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove an instance from `revision`
    ///
    /// Every index of its lineage is notified. Returns whether it
    /// was visible.
    pub fn delete(self: &Arc<Self>, revision: &Revision, instance: &Instance) -> Result<bool> {
        let model = self.model_for(instance)?;
        if !revision.contains(instance) {
            return Ok(false);
        }
        let view = InstanceView::new(revision, instance);
        for observer in model.chain_observers() {
            observer.on_delete(&view);
        }
        revision.remove(instance);
        trace!(model = %model.name, %instance, "deleted instance");
        Ok(true)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Every instance of this model (extensions included) visible in `revision`
    pub fn all(&self, revision: &Revision) -> Sequence<Instance> {
        let id = self.id;
        Box::new(
            revision
                .iterator()
                .filter(move |instance| instance.is_instance_of(id)),
        )
    }

    /// Number of instances visible in `revision`
    pub fn count(&self, revision: &Revision) -> usize {
        self.all(revision).count()
    }

    /// Instances satisfying `predicate`
    pub fn filter<F>(&self, revision: &Revision, predicate: F) -> Sequence<Instance>
    where
        F: FnMut(&Instance) -> bool + Send + 'static,
    {
        Box::new(self.all(revision).filter(predicate))
    }

    /// Values of property `key` across every instance, in iteration order
    ///
    /// Reads are recorded in the revision's read set.
    pub fn select(&self, revision: &Arc<Revision>, key: &str) -> Result<Sequence<Value>> {
        self.lookup(key)?;
        let instances = self.all(revision);
        let revision = Arc::clone(revision);
        let key = key.to_string();
        Ok(Box::new(instances.map(move |instance| {
            revision.get_value_for(&instance, &key).unwrap_or_default()
        })))
    }

    /// Start a conditional query
    pub fn query(self: &Arc<Self>, revision: &Arc<Revision>) -> Query {
        Query::new(Arc::clone(self), Arc::clone(revision))
    }

    /// Instances whose key in index `index_name` equals `key`
    ///
    /// Unknown index names yield an empty sequence.
    pub fn find(
        &self,
        revision: &Arc<Revision>,
        index_name: &str,
        key: impl Into<Value>,
    ) -> Sequence<Instance> {
        let index = match self.index(index_name) {
            Some(index) => index,
            None => return sequence::empty(),
        };
        let members = index.find(revision, key);
        if index.model_id() == self.id {
            members
        } else {
            let id = self.id;
            Box::new(members.filter(move |instance| instance.is_instance_of(id)))
        }
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Look up an index, own or inherited
    pub fn index(&self, name: &str) -> Option<Arc<Index>> {
        self.ancestry().find_map(|model| {
            model
                .indexes
                .read()
                .iter()
                .find(|index| index.name() == name)
                .cloned()
        })
    }

    /// Own indexes
    pub fn indexes(&self) -> Vec<Arc<Index>> {
        self.indexes.read().clone()
    }

    /// Add an index and populate it from the instances visible in `revision`
    pub fn create_index(
        &self,
        revision: &Revision,
        name: impl Into<String>,
        key: impl Into<IndexKey>,
    ) -> Result<Arc<Index>> {
        let index = self.attach_index(Index::new(name, self.id, key.into()))?;
        for instance in self.all(revision) {
            index.insert(&InstanceView::new(revision, &instance));
        }
        debug!(model = %self.name, index = %index.name(), buckets = index.bucket_count(), "created index");
        Ok(index)
    }

    fn attach_index(&self, index: Index) -> Result<Arc<Index>> {
        if self.index(index.name()).is_some() {
            return Err(Error::DuplicateIndex {
                model: self.name.clone(),
                index: index.name().to_string(),
            });
        }
        if let IndexKey::Property(key) = index.key() {
            self.lookup(key)?;
        }
        let index = Arc::new(index);
        self.indexes.write().push(Arc::clone(&index));
        self.observers.write().push(Arc::clone(&index) as Arc<dyn MutationObserver>);
        Ok(index)
    }
}

fn current_list(revision: &Revision, instance: &Instance, key: &str) -> Vec<Value> {
    revision
        .get_value_for(instance, key)
        .and_then(|value| value.as_list().map(<[Value]>::to_vec))
        .unwrap_or_default()
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("properties", &self.properties)
            .finish()
    }
}
