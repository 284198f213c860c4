use anyhow::anyhow;

/// Whether an in-memory driven port should behave as if its backing service is reachable
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    /// Fails the way a real adapter would when its service is unreachable
    pub fn blow_up_if_disconnected(&self) -> Result<(), anyhow::Error> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(anyhow!("could not connect to service!")),
        }
    }
}

/// Records the arguments of every call to a faked trait method and hands back a canned result.
/// Mock driving ports wrap their state in a [std::sync::Mutex] and keep one of these per method:
///
/// ```ignore
/// impl TaskPort for Mutex<MockTaskService> {
///     async fn delete_task(&self, user_id: Uuid, task_id: Uuid, ..) -> Result<(), TaskError> {
///         let mut locked_self = self.lock().expect("mock task service mutex poisoned");
///         locked_self.delete_task_result.save_arguments((user_id, task_id));
///         locked_self.delete_task_result.return_value_result()
///     }
/// }
/// ```
pub struct FakeImplementation<Args, Ret> {
    saved_arguments: Vec<Args>,
    return_value: Option<Ret>,
}

impl<Args, Ret> FakeImplementation<Args, Ret> {
    pub fn new() -> FakeImplementation<Args, Ret> {
        FakeImplementation {
            saved_arguments: Vec::new(),
            return_value: None,
        }
    }

    pub fn save_arguments(&mut self, arguments: Args) {
        self.saved_arguments.push(arguments)
    }

    /// Arguments of every call so far, oldest first
    pub fn calls(&self) -> &[Args] {
        self.saved_arguments.as_slice()
    }
}

impl<Args, Success, Fail> FakeImplementation<Args, Result<Success, Fail>>
where
    Success: Clone,
    Fail: Clone,
{
    pub fn set_returned_result(&mut self, return_value: Result<Success, Fail>) {
        self.return_value = Some(return_value)
    }

    /// Clones out the configured result. Panics if the test never configured one.
    pub fn return_value_result(&self) -> Result<Success, Fail> {
        match self.return_value {
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(err.clone()),
            None => panic!("Tried to return from a function where the return value wasn't set!"),
        }
    }
}
