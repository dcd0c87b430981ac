#[derive(Clone)]
pub struct AppState {
    kernel: Arc<Kernel>,
    oracle: Arc<dyn IntentOracle>,
    world: Arc<Mutex<Option<WorldSnapshot>>>,
}

impl AppState {
    /// Agents that send no intent are driven by the rule oracle.
    pub fn new(kernel: Kernel) -> Self {
        let oracle = Arc::new(RuleOracle::new(kernel.config().clone()));
        Self {
            kernel: Arc::new(kernel),
            oracle,
            world: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn IntentOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Retire and perceive against `snapshot`, then keep it as the current world.
    async fn ingest(&self, snapshot: WorldSnapshot) -> (TickReport, WorldSnapshot) {
        let report = self.kernel.begin_tick(&snapshot);
        *self.world.lock().await = Some(snapshot.clone());
        (report, snapshot)
    }

    async fn current_world(&self) -> Option<WorldSnapshot> {
        self.world.lock().await.clone()
    }
}

/// Hands a caller-supplied raw decision to the kernel so that unknown
/// commands degrade the same way an oracle's would.
struct RelayedDecision(Decision);

impl IntentOracle for RelayedDecision {
    fn decide(&self, _ctx: &OracleContext<'_>) -> Decision {
        self.0.clone()
    }
}
