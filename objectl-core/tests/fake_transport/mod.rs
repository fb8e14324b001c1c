//! An in-memory object server used as the transport in the tests.
//!
//! Objects are stored per service. `Get`, `List`, `Create`, `Update` and `Delete` behave like a
//! well mannered server, `List` filters are evaluated with the same expression engine used by
//! the client. Every call is recorded so that tests can check how many were sent.
#![allow(dead_code)]

use objectl_core::expr::{Environment, Value as ExprValue};
use objectl_core::prost_reflect::{
    DescriptorPool, DynamicMessage, MessageDescriptor, ReflectMessage, Value,
};
use objectl_core::tonic::Status;
use objectl_core::{InvokeError, Transport};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<DynamicMessage>>,
    calls: Vec<String>,
    failures: HashMap<String, Status>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object as if it had been created by the server of `service`, for example
    /// `fulfillment.v1.Clusters`.
    pub fn insert(&self, service: &str, object: DynamicMessage) {
        let mut state = self.state.lock().unwrap();
        state
            .objects
            .entry(service.to_string())
            .or_default()
            .push(object);
    }

    /// Makes every call to the given method path fail with the status.
    pub fn fail(&self, path: &str, status: Status) {
        let mut state = self.state.lock().unwrap();
        state.failures.insert(path.to_string(), status);
    }

    /// The paths of all the calls received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls().iter().filter(|call| *call == path).count()
    }

    pub fn stored(&self, service: &str) -> Vec<DynamicMessage> {
        let state = self.state.lock().unwrap();
        state.objects.get(service).cloned().unwrap_or_default()
    }

    fn handle(
        &self,
        path: &str,
        request: &DynamicMessage,
        descriptor: MessageDescriptor,
    ) -> Result<DynamicMessage, Status> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(path.to_string());
        if let Some(status) = state.failures.get(path) {
            return Err(status.clone());
        }

        let (service, method) = path
            .trim_start_matches('/')
            .split_once('/')
            .ok_or_else(|| Status::unimplemented(path.to_string()))?;
        let mut response = DynamicMessage::new(descriptor);
        match method {
            "Get" => {
                let id = string_field(request, "id");
                let object = state
                    .objects
                    .get(service)
                    .and_then(|objects| objects.iter().find(|o| string_field(o, "id") == id))
                    .cloned()
                    .ok_or_else(|| Status::not_found(format!("object '{id}' doesn't exist")))?;
                response.set_field_by_name("object", Value::Message(object));
            }
            "List" => {
                let items_field = response
                    .descriptor()
                    .get_field_by_name("items")
                    .ok_or_else(|| Status::internal("no items field"))?;
                let item_type = items_field
                    .kind()
                    .as_message()
                    .cloned()
                    .ok_or_else(|| Status::internal("items aren't messages"))?;
                let mut items = state.objects.get(service).cloned().unwrap_or_default();

                let filter = string_field(request, "filter");
                if !filter.is_empty() {
                    let program = Environment::for_object(item_type)
                        .compile(&filter)
                        .map_err(|e| Status::invalid_argument(e.to_string()))?;
                    items.retain(|item| matches!(program.eval(item), Ok(ExprValue::Bool(true))));
                }
                let total = items.len() as i32;
                if let Some(limit) = request.get_field_by_name("limit").and_then(|v| v.as_i32()) {
                    if limit > 0 {
                        items.truncate(limit as usize);
                    }
                }

                response.set_field_by_name("size", Value::I32(items.len() as i32));
                if response.descriptor().get_field_by_name("total").is_some() {
                    response.set_field_by_name("total", Value::I32(total));
                }
                response.set_field_by_name(
                    "items",
                    Value::List(items.into_iter().map(Value::Message).collect()),
                );
            }
            "Create" => {
                let mut object = message_field(request, "object")?;
                if string_field(&object, "id").is_empty() {
                    state.next_id += 1;
                    let id = format!("{:03}", state.next_id);
                    object.set_field_by_name("id", Value::String(id));
                }
                state
                    .objects
                    .entry(service.to_string())
                    .or_default()
                    .push(object.clone());
                response.set_field_by_name("object", Value::Message(object));
            }
            "Update" => {
                let object = message_field(request, "object")?;
                let id = string_field(&object, "id");
                let stored = state
                    .objects
                    .get_mut(service)
                    .and_then(|objects| objects.iter_mut().find(|o| string_field(o, "id") == id))
                    .ok_or_else(|| Status::not_found(format!("object '{id}' doesn't exist")))?;
                *stored = object.clone();
                response.set_field_by_name("object", Value::Message(object));
            }
            "Delete" => {
                let id = string_field(request, "id");
                let objects = state.objects.entry(service.to_string()).or_default();
                let before = objects.len();
                objects.retain(|o| string_field(o, "id") != id);
                if objects.len() == before {
                    return Err(Status::not_found(format!("object '{id}' doesn't exist")));
                }
            }
            _ => return Err(Status::unimplemented(path.to_string())),
        }
        Ok(response)
    }
}

impl Transport for FakeTransport {
    async fn invoke(
        &self,
        path: &str,
        request: DynamicMessage,
        response: MessageDescriptor,
    ) -> Result<DynamicMessage, InvokeError> {
        Ok(self.handle(path, &request, response)?)
    }
}

fn string_field(message: &DynamicMessage, name: &str) -> String {
    message
        .get_field_by_name(name)
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn message_field(message: &DynamicMessage, name: &str) -> Result<DynamicMessage, Status> {
    message
        .get_field_by_name(name)
        .and_then(|value| value.as_message().cloned())
        .ok_or_else(|| Status::invalid_argument(format!("field '{name}' is mandatory")))
}

pub fn pool() -> DescriptorPool {
    objectl_fixtures::descriptor_pool()
}

/// Builds a message of the given type from its JSON representation.
pub fn message(full_name: &str, json: serde_json::Value) -> DynamicMessage {
    let descriptor = pool().get_message_by_name(full_name).unwrap();
    DynamicMessage::deserialize(descriptor, json).unwrap()
}
