//! Explicit declaration of managed objects.
//!
//! A host describes what it exposes with an [`ObjectBuilder`]: typed
//! [`Property`] accessors and [`Action`] handlers over its own type. At
//! registration the builder is validated, turned into descriptors, and bound
//! to the live object behind type-erased accessors.
//!
//! # Example
//!
//! ```rust
//! use sjmp_core::{Action, Limits, ManagedObject, ObjectBuilder, Property};
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! struct Pump {
//!     rpm: AtomicI32,
//! }
//!
//! impl ManagedObject for Pump {
//!     fn declare(builder: ObjectBuilder<Self>) -> ObjectBuilder<Self> {
//!         builder
//!             .property(
//!                 Property::new("rpm", "rotations per minute", |p: &Pump| {
//!                     p.rpm.load(Ordering::Relaxed)
//!                 })
//!                 .setter(|p: &Pump, v: i32| p.rpm.store(v, Ordering::Relaxed))
//!                 .limits(Limits::int(0, 3000))
//!                 .show_graph(),
//!             )
//!             .action(Action::new("stop", "Stop the pump", |p: &Pump, _args| {
//!                 p.rpm.store(0, Ordering::Relaxed);
//!                 Ok(())
//!             }))
//!     }
//! }
//! ```

use crate::descriptor::{ActionDescriptor, Limits, ParameterDescriptor, PropertyDescriptor};
use crate::error::{Result, SjmpError};
use crate::schema::ObjectSchema;
use crate::types::WireType;
use crate::value::{HostType, WireValue};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A type that declares its own management surface.
pub trait ManagedObject: Send + Sync + Sized + 'static {
    fn declare(builder: ObjectBuilder<Self>) -> ObjectBuilder<Self>;
}

type Getter = Box<dyn Fn() -> WireValue + Send + Sync>;
type Setter = Box<dyn Fn(WireValue) -> Result<()> + Send + Sync>;
type Invoker = Box<dyn Fn(Arguments) -> anyhow::Result<WireValue> + Send + Sync>;

/// Declaration of one property of `T` with value type `V`.
pub struct Property<T, V> {
    name: String,
    description: String,
    read_only: bool,
    show_graph: bool,
    limits: Option<Limits>,
    getter: Box<dyn Fn(&T) -> V + Send + Sync>,
    setter: Option<Box<dyn Fn(&T, V) + Send + Sync>>,
}

impl<T: Send + Sync + 'static, V: HostType> Property<T, V> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        getter: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            read_only: false,
            show_graph: false,
            limits: None,
            getter: Box::new(getter),
            setter: None,
        }
    }

    /// Make the property writable. Without a setter it is read-only.
    pub fn setter(mut self, setter: impl Fn(&T, V) + Send + Sync + 'static) -> Self {
        self.setter = Some(Box::new(setter));
        self
    }

    /// Force read-only even when a setter is present.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Ask clients to chart this property as a time series.
    pub fn show_graph(mut self) -> Self {
        self.show_graph = true;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Declaration of one action of `T` returning `R`.
pub struct Action<T, R> {
    name: String,
    description: String,
    require_confirm: bool,
    parameters: Vec<ParameterDescriptor>,
    handler: Box<dyn Fn(&T, &Arguments) -> anyhow::Result<R> + Send + Sync>,
}

impl<T: Send + Sync + 'static, R: HostType> Action<T, R> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl Fn(&T, &Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            require_confirm: false,
            parameters: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Append a parameter. Its position is the declaration order.
    pub fn param<V: HostType>(self, name: impl Into<String>) -> Self {
        self.push_param(name.into(), V::WIRE_TYPE, None)
    }

    /// Append a parameter with a description.
    pub fn documented_param<V: HostType>(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.push_param(name.into(), V::WIRE_TYPE, Some(description.into()))
    }

    /// Clients must confirm before invoking.
    pub fn require_confirm(mut self) -> Self {
        self.require_confirm = true;
        self
    }

    fn push_param(mut self, name: String, wire_type: WireType, description: Option<String>) -> Self {
        let index = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name,
            wire_type,
            description,
            index,
        });
        self
    }
}

/// Positional arguments handed to an action handler.
///
/// Parameters the caller did not send are absent; the handler picks its own
/// default.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    names: Vec<String>,
    slots: Vec<Option<WireValue>>,
}

impl Arguments {
    pub fn new(names: Vec<String>, slots: Vec<Option<WireValue>>) -> Self {
        Self { names, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Raw value at a position.
    pub fn raw(&self, index: usize) -> Option<&WireValue> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Typed value at a position, `None` when absent.
    pub fn get<V: HostType>(&self, index: usize) -> Option<V> {
        self.raw(index).cloned().and_then(V::from_wire)
    }

    pub fn get_or_default<V: HostType + Default>(&self, index: usize) -> V {
        self.get(index).unwrap_or_default()
    }

    /// Typed value by parameter name.
    pub fn by_name<V: HostType>(&self, name: &str) -> Option<V> {
        let index = self.names.iter().position(|n| n == name)?;
        self.get(index)
    }
}

struct PropertyDecl<T> {
    descriptor: PropertyDescriptor,
    bind: Box<dyn FnOnce(Arc<T>) -> BoundProperty + Send>,
}

struct ActionDecl<T> {
    descriptor: ActionDescriptor,
    bind: Box<dyn FnOnce(Arc<T>) -> Invoker + Send>,
}

/// Collects the management surface of one object of type `T`.
pub struct ObjectBuilder<T> {
    properties: Vec<PropertyDecl<T>>,
    actions: Vec<ActionDecl<T>>,
}

impl<T: Send + Sync + 'static> Default for ObjectBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> ObjectBuilder<T> {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn property<V: HostType>(mut self, property: Property<T, V>) -> Self {
        let Property {
            name,
            description,
            read_only,
            show_graph,
            limits,
            getter,
            setter,
        } = property;

        let readonly = read_only || setter.is_none();
        let setter = if readonly { None } else { setter };
        let descriptor = PropertyDescriptor {
            name,
            wire_type: V::WIRE_TYPE,
            readonly,
            description,
            show_graph,
            limits,
        };

        let bind = move |target: Arc<T>| {
            let get_target = target.clone();
            let get: Getter = Box::new(move || getter(&get_target).into_wire());
            let set = setter.map(|setter| -> Setter {
                Box::new(move |value: WireValue| {
                    let found = value.wire_type().to_string();
                    let value = V::from_wire(value).ok_or(SjmpError::TypeMismatch {
                        expected: V::WIRE_TYPE,
                        found,
                    })?;
                    setter(&target, value);
                    Ok(())
                })
            });
            BoundProperty { get, set }
        };

        self.properties.push(PropertyDecl {
            descriptor,
            bind: Box::new(bind),
        });
        self
    }

    /// Expose a value with no wire type as a read-only string.
    pub fn display_property<V: Display + 'static>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        getter: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        let descriptor = PropertyDescriptor {
            name: name.into(),
            wire_type: WireType::String,
            readonly: true,
            description: description.into(),
            show_graph: false,
            limits: None,
        };
        let bind = move |target: Arc<T>| BoundProperty {
            get: Box::new(move || WireValue::String(getter(&target).to_string())),
            set: None,
        };
        self.properties.push(PropertyDecl {
            descriptor,
            bind: Box::new(bind),
        });
        self
    }

    pub fn action<R: HostType>(mut self, action: Action<T, R>) -> Self {
        let Action {
            name,
            description,
            require_confirm,
            parameters,
            handler,
        } = action;

        let descriptor = ActionDescriptor {
            name,
            result: R::WIRE_TYPE,
            description,
            require_confirm,
            parameters,
        };
        let bind = move |target: Arc<T>| -> Invoker {
            Box::new(move |args: Arguments| handler(&target, &args).map(HostType::into_wire))
        };

        self.actions.push(ActionDecl {
            descriptor,
            bind: Box::new(bind),
        });
        self
    }

    /// Validate the declaration and bind it to `target`.
    pub(crate) fn build(
        self,
        target: &Arc<T>,
        name: String,
        description: String,
        group: String,
    ) -> Result<RegisteredObject> {
        for (index, decl) in self.properties.iter().enumerate() {
            decl.descriptor.validate()?;
            if self.properties[..index]
                .iter()
                .any(|other| other.descriptor.name == decl.descriptor.name)
            {
                return Err(SjmpError::DuplicateMember {
                    kind: "property",
                    name: decl.descriptor.name.clone(),
                });
            }
        }
        for (index, decl) in self.actions.iter().enumerate() {
            decl.descriptor.validate()?;
            if self.actions[..index]
                .iter()
                .any(|other| other.descriptor.name == decl.descriptor.name)
            {
                return Err(SjmpError::DuplicateMember {
                    kind: "action",
                    name: decl.descriptor.name.clone(),
                });
            }
        }

        let mut property_schemas = Vec::with_capacity(self.properties.len());
        let mut properties = Vec::with_capacity(self.properties.len());
        for decl in self.properties {
            property_schemas.push(decl.descriptor);
            properties.push((decl.bind)(target.clone()));
        }

        let mut action_schemas = Vec::with_capacity(self.actions.len());
        let mut actions = Vec::with_capacity(self.actions.len());
        for decl in self.actions {
            action_schemas.push(decl.descriptor);
            actions.push((decl.bind)(target.clone()));
        }

        let target: Arc<dyn Any + Send + Sync> = target.clone();
        Ok(RegisteredObject {
            schema: ObjectSchema {
                name,
                description,
                group,
                properties: property_schemas,
                actions: action_schemas,
            },
            target,
            properties,
            actions,
        })
    }
}

struct BoundProperty {
    get: Getter,
    set: Option<Setter>,
}

/// A registered object: its descriptors plus live accessors.
pub(crate) struct RegisteredObject {
    pub(crate) schema: ObjectSchema,
    pub(crate) target: Arc<dyn Any + Send + Sync>,
    properties: Vec<BoundProperty>,
    actions: Vec<Invoker>,
}

impl RegisteredObject {
    pub(crate) fn name(&self) -> &str {
        &self.schema.name
    }

    fn property_index(&self, name: &str) -> Result<usize> {
        self.schema
            .properties
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SjmpError::UnknownProperty(name.to_string()))
    }

    /// Current value of every property, in declaration order.
    pub(crate) fn read_all(&self) -> Map<String, Value> {
        self.schema
            .properties
            .iter()
            .zip(&self.properties)
            .map(|(descriptor, bound)| (descriptor.name.clone(), (bound.get)().to_json()))
            .collect()
    }

    pub(crate) fn read(&self, name: &str) -> Result<WireValue> {
        let index = self.property_index(name)?;
        Ok((self.properties[index].get)())
    }

    /// Coerce, validate and store a new property value.
    pub(crate) fn write(&self, name: &str, value: &Value) -> Result<()> {
        let index = self.property_index(name)?;
        let descriptor = &self.schema.properties[index];
        let setter = match (&self.properties[index].set, descriptor.readonly) {
            (Some(setter), false) => setter,
            _ => return Err(SjmpError::ReadOnlyProperty(name.to_string())),
        };

        let value = WireValue::from_json(value, descriptor.wire_type)?;
        if let Some(limits) = &descriptor.limits {
            limits.check(&value)?;
        }
        setter(value)
    }

    /// Map named wire arguments to positions and run the action.
    pub(crate) fn invoke(&self, name: &str, parameters: &Map<String, Value>) -> Result<WireValue> {
        let index = self
            .schema
            .actions
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| SjmpError::UnknownAction(name.to_string()))?;
        let descriptor = &self.schema.actions[index];

        let mut slots = vec![None; descriptor.parameters.len()];
        for (arg_name, arg_value) in parameters {
            let parameter = descriptor
                .parameter(arg_name)
                .ok_or_else(|| SjmpError::UnknownParameter(arg_name.clone()))?;
            match arg_value {
                Value::Null => {}
                Value::Array(_) | Value::Object(_) => {
                    return Err(SjmpError::NonScalarParameter(arg_name.clone()))
                }
                scalar => {
                    slots[parameter.index] = Some(WireValue::from_json(scalar, parameter.wire_type)?);
                }
            }
        }
        let names = descriptor.parameters.iter().map(|p| p.name.clone()).collect();
        let args = Arguments::new(names, slots);

        let invoker = &self.actions[index];
        match catch_unwind(AssertUnwindSafe(|| invoker(args))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SjmpError::ActionFailed {
                action: name.to_string(),
                message: format!("{:#}", e),
            }),
            Err(_) => Err(SjmpError::ActionFailed {
                action: name.to_string(),
                message: "action panicked".to_string(),
            }),
        }
    }
}
