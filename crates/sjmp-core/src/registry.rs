//! The object registry.
//!
//! Holds every registered object keyed by name and by identity, and owns the
//! serialized schema snapshot. Registration, unregistration and port changes
//! take the writer lock and rebuild the snapshot before releasing it; the data
//! verbs take the reader lock for lookup and host access only.
//!
//! The snapshot is published through a `tokio::sync::watch` channel so schema
//! fetches and the push task never touch the lock. The `_quiet` variants of
//! registration update the snapshot without waking subscribers, which lets a
//! host register in bulk and call [`Registry::notify_subscribers`] once.

use crate::error::{Result, SjmpError};
use crate::object::{ManagedObject, ObjectBuilder, RegisteredObject};
use crate::schema::{ObjectSchema, Schema, ServerInfo};
use crate::value::WireValue;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// Pointer identity of a registered `Arc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObjectId(usize);

impl ObjectId {
    fn of<T>(object: &Arc<T>) -> Self {
        ObjectId(Arc::as_ptr(object) as *const () as usize)
    }
}

struct RegistryState {
    objects: BTreeMap<String, RegisteredObject>,
    identities: HashMap<ObjectId, String>,
    /// Bumped on every schema rebuild.
    counter: u64,
    port: u16,
}

impl RegistryState {
    fn object(&self, name: &str) -> Result<&RegisteredObject> {
        self.objects
            .get(name)
            .ok_or_else(|| SjmpError::UnknownObject(name.to_string()))
    }
}

/// Registry of managed objects for one server.
pub struct Registry {
    info: ServerInfo,
    state: RwLock<RegistryState>,
    schema_tx: watch::Sender<Arc<str>>,
}

impl Registry {
    pub fn new(info: ServerInfo) -> Self {
        let mut state = RegistryState {
            objects: BTreeMap::new(),
            identities: HashMap::new(),
            counter: 0,
            port: 0,
        };
        let initial = render_schema(&info, &mut state).unwrap_or_else(|_| Arc::from("{}"));
        let (schema_tx, _) = watch::channel(initial);

        Self {
            info,
            state: RwLock::new(state),
            schema_tx,
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Register an object that declares its own management surface.
    pub fn register<T: ManagedObject>(
        &self,
        object: &Arc<T>,
        name: impl Into<String>,
        description: impl Into<String>,
        group: impl Into<String>,
    ) -> Result<()> {
        let builder = T::declare(ObjectBuilder::new());
        self.register_with(object, name, description, group, builder)
    }

    /// Register an object with an explicit declaration.
    ///
    /// Fails without changing the registry when the declaration is invalid or
    /// when the name or the object itself is already registered.
    pub fn register_with<T: Send + Sync + 'static>(
        &self,
        object: &Arc<T>,
        name: impl Into<String>,
        description: impl Into<String>,
        group: impl Into<String>,
        builder: ObjectBuilder<T>,
    ) -> Result<()> {
        self.insert(object, name.into(), description.into(), group.into(), builder, true)
    }

    /// Register like [`Registry::register`] without waking schema subscribers.
    pub fn register_quiet<T: ManagedObject>(
        &self,
        object: &Arc<T>,
        name: impl Into<String>,
        description: impl Into<String>,
        group: impl Into<String>,
    ) -> Result<()> {
        let builder = T::declare(ObjectBuilder::new());
        self.insert(object, name.into(), description.into(), group.into(), builder, false)
    }

    fn insert<T: Send + Sync + 'static>(
        &self,
        object: &Arc<T>,
        name: String,
        description: String,
        group: String,
        builder: ObjectBuilder<T>,
        notify: bool,
    ) -> Result<()> {
        let registered = builder.build(object, name.clone(), description, group)?;
        let id = ObjectId::of(object);

        let mut state = self.state.write()?;
        if state.objects.contains_key(&name) || state.identities.contains_key(&id) {
            return Err(SjmpError::DuplicateObject { name });
        }
        state.objects.insert(name.clone(), registered);
        state.identities.insert(id, name.clone());

        if let Err(e) = self.publish(&mut state, notify) {
            state.objects.remove(&name);
            state.identities.remove(&id);
            return Err(e);
        }
        info!("Registered object '{}'", name);
        Ok(())
    }

    /// Remove a previously registered object.
    pub fn unregister<T>(&self, object: &Arc<T>) -> Result<()> {
        self.remove(object, true)
    }

    /// Unregister without waking schema subscribers.
    pub fn unregister_quiet<T>(&self, object: &Arc<T>) -> Result<()> {
        self.remove(object, false)
    }

    fn remove<T>(&self, object: &Arc<T>, notify: bool) -> Result<()> {
        let id = ObjectId::of(object);

        let mut state = self.state.write()?;
        let name = state
            .identities
            .remove(&id)
            .ok_or_else(|| SjmpError::ObjectNotFound {
                name: format!("{:p}", Arc::as_ptr(object)),
            })?;
        state.objects.remove(&name);
        self.publish(&mut state, notify)?;

        info!("Unregistered object '{}'", name);
        Ok(())
    }

    /// Record the bound port in the schema.
    pub fn set_port(&self, port: u16) -> Result<()> {
        let mut state = self.state.write()?;
        state.port = port;
        self.publish(&mut state, true)
    }

    /// Wake schema subscribers with the current snapshot, e.g. after a run of
    /// quiet registrations.
    pub fn notify_subscribers(&self) {
        self.schema_tx.send_modify(|_| {});
    }

    pub fn port(&self) -> u16 {
        self.state.read().map(|s| s.port).unwrap_or(0)
    }

    /// Type-erased handle to a registered object.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Any + Send + Sync>> {
        let state = self.state.read()?;
        Ok(state.object(name)?.target.clone())
    }

    /// Typed handle to a registered object. Fails when the name is unknown or
    /// the object is of another type.
    pub fn lookup_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.lookup(name)?
            .downcast::<T>()
            .map_err(|_| SjmpError::UnknownObject(name.to_string()))
    }

    /// Current serialized schema.
    pub fn snapshot(&self) -> Arc<str> {
        self.schema_tx.borrow().clone()
    }

    /// Watch the serialized schema. The receiver is woken by every rebuild
    /// except the quiet ones.
    pub fn subscribe(&self) -> watch::Receiver<Arc<str>> {
        self.schema_tx.subscribe()
    }

    /// Current schema as a structured document.
    pub fn schema(&self) -> Result<Schema> {
        Ok(serde_json::from_str(&self.snapshot())?)
    }

    /// Registered object names in schema order.
    pub fn object_names(&self) -> Result<Vec<String>> {
        Ok(self.state.read()?.objects.keys().cloned().collect())
    }

    /// Descriptor of one registered object.
    pub fn describe(&self, name: &str) -> Result<ObjectSchema> {
        Ok(self.state.read()?.object(name)?.schema.clone())
    }

    /// Current property values keyed by object name.
    ///
    /// Without an object name every object is listed and `property` is
    /// ignored; with both names the inner map holds the single property.
    pub fn get_properties(
        &self,
        object: Option<&str>,
        property: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let state = self.state.read()?;
        let mut objects = Map::new();

        match object {
            None => {
                for (name, registered) in &state.objects {
                    objects.insert(name.clone(), Value::Object(registered.read_all()));
                }
            }
            Some(name) => {
                let registered = state.object(name)?;
                let values = match property {
                    None => registered.read_all(),
                    Some(property) => {
                        let mut values = Map::new();
                        values.insert(property.to_string(), registered.read(property)?.to_json());
                        values
                    }
                };
                objects.insert(registered.name().to_string(), Value::Object(values));
            }
        }
        Ok(objects)
    }

    /// Coerce, range-check and store a property value.
    pub fn set_property(&self, object: &str, property: &str, value: &Value) -> Result<()> {
        let state = self.state.read()?;
        state.object(object)?.write(property, value)?;
        debug!("Set {}.{} = {}", object, property, value);
        Ok(())
    }

    /// Invoke an action with named arguments.
    pub fn execute(
        &self,
        object: &str,
        action: &str,
        parameters: &Map<String, Value>,
    ) -> Result<WireValue> {
        let state = self.state.read()?;
        let result = state.object(object)?.invoke(action, parameters)?;
        debug!("Executed {}.{}", object, action);
        Ok(result)
    }

    /// Rebuild the snapshot, waking subscribers when `notify` is set. Caller
    /// holds the writer lock.
    fn publish(&self, state: &mut RegistryState, notify: bool) -> Result<()> {
        let text = render_schema(&self.info, state)?;
        self.schema_tx.send_if_modified(|current| {
            *current = text;
            notify
        });
        Ok(())
    }
}

fn render_schema(info: &ServerInfo, state: &mut RegistryState) -> Result<Arc<str>> {
    state.counter += 1;
    let schema_version = format!("{}.{}", chrono::Utc::now().timestamp(), state.counter);
    let objects = state
        .objects
        .values()
        .map(|o| o.schema.clone())
        .collect();

    let schema = Schema::new(info, state.port, schema_version, objects);
    Ok(Arc::from(serde_json::to_string(&schema)?))
}
