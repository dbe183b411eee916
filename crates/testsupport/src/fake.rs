use async_trait::async_trait;
use jambda_client::ResourceClient;
use jambda_models::{ClientError, FunctionConfiguration, FunctionResource, Payload};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Remove,
}

/// One call received by the fake, recorded when the call starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub configuration: Option<FunctionConfiguration>,
    pub payload_len: Option<usize>,
}

impl RecordedCall {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            external_id: None,
            name: None,
            configuration: None,
            payload_len: None,
        }
    }
}

#[derive(Default)]
struct FakeState {
    next_id: i64,
    functions: Vec<FunctionResource>,
    calls: Vec<RecordedCall>,
    failures: HashMap<Operation, VecDeque<ClientError>>,
    gates: HashMap<Operation, Arc<Semaphore>>,
}

/// In-memory control plane implementing `ResourceClient`.
///
/// Operations can be made to fail once with a chosen error, or held until
/// released so tests can observe state while a call is in flight.
#[derive(Clone, Default)]
pub struct FakeControlPlane {
    state: Arc<Mutex<FakeState>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a function directly, as if created by someone else.
    pub fn seed(&self, name: &str, configuration: FunctionConfiguration) -> FunctionResource {
        let mut state = self.lock();
        state.next_id += 1;
        let resource = FunctionResource {
            id: state.next_id,
            external_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            configuration,
            state: Some("ACTIVE".to_string()),
            created_at: None,
            updated_at: None,
        };
        state.functions.push(resource.clone());
        resource
    }

    pub fn functions(&self) -> Vec<FunctionResource> {
        self.lock().functions.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Total number of calls of any kind.
    pub fn network_calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// The next call of `operation` fails with `error`.
    pub fn fail_next(&self, operation: Operation, error: ClientError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Calls of `operation` block until `release` is called.
    pub fn hold(&self, operation: Operation) {
        self.lock()
            .gates
            .insert(operation, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, operation: Operation) {
        if let Some(gate) = self.lock().gates.remove(&operation) {
            gate.close();
        }
    }

    async fn enter(&self, call: RecordedCall) -> Result<(), ClientError> {
        let operation = call.operation;
        let gate = {
            let mut state = self.lock();
            state.calls.push(call);
            state.gates.get(&operation).cloned()
        };

        if let Some(gate) = gate {
            // Only ever closed, never given permits: acquiring returns once released.
            let _ = gate.acquire().await;
        }

        match self
            .lock()
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found() -> ClientError {
    ClientError::remote(404, "not found")
}

#[async_trait]
impl ResourceClient for FakeControlPlane {
    async fn list(&self) -> Result<Vec<FunctionResource>, ClientError> {
        self.enter(RecordedCall::new(Operation::List)).await?;
        Ok(self.functions())
    }

    async fn create(
        &self,
        name: &str,
        configuration: &FunctionConfiguration,
        payload: &Payload,
    ) -> Result<FunctionResource, ClientError> {
        self.enter(RecordedCall {
            name: Some(name.to_string()),
            configuration: Some(configuration.clone()),
            payload_len: Some(payload.len()),
            ..RecordedCall::new(Operation::Create)
        })
        .await?;

        Ok(self.seed(name, configuration.clone()))
    }

    async fn update(
        &self,
        external_id: &str,
        name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<FunctionResource, ClientError> {
        self.enter(RecordedCall {
            external_id: Some(external_id.to_string()),
            name: Some(name.to_string()),
            configuration: Some(configuration.clone()),
            ..RecordedCall::new(Operation::Update)
        })
        .await?;

        let mut state = self.lock();
        let resource = state
            .functions
            .iter_mut()
            .find(|resource| resource.external_id == external_id)
            .ok_or_else(not_found)?;
        resource.name = name.to_string();
        resource.configuration = configuration.clone();
        Ok(resource.clone())
    }

    async fn remove(&self, external_id: &str) -> Result<(), ClientError> {
        self.enter(RecordedCall {
            external_id: Some(external_id.to_string()),
            ..RecordedCall::new(Operation::Remove)
        })
        .await?;

        let mut state = self.lock();
        let index = state
            .functions
            .iter()
            .position(|resource| resource.external_id == external_id)
            .ok_or_else(not_found)?;
        state.functions.remove(index);
        Ok(())
    }
}
