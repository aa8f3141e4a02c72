use std::sync::Arc;

use conduit_core::{
    props_for_category, Capabilities, Category, CategoryProperties, ConduitError, ExecutionMode, Flow,
    HttpResponse, Payload, Result, ORDERED_CATEGORIES,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::plugin::PluginInstance;

/// Runs a single flow over all registered plugins, in fixed category order,
/// enforcing each category's execution-mode and error policy.
///
/// Registration only happens at startup; the registry is read-locked for
/// every `run`, so concurrent HTTP exchanges can share one `Pipeline`.
pub struct Pipeline {
    categories: RwLock<std::collections::HashMap<Category, Vec<PluginInstance>>>,
    category_props: fn(&Category) -> CategoryProperties,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            categories: RwLock::new(std::collections::HashMap::new()),
            category_props: props_for_category,
        }
    }

    /// Build a pipeline that looks up category properties through
    /// `category_props` instead of [`props_for_category`]. The fixed
    /// category table never actually produces a PARALLEL+`can_modify`
    /// combination, so this is how the configuration-error guard in
    /// [`Pipeline::run`] gets exercised at runtime in tests.
    #[cfg(test)]
    fn with_category_props(category_props: fn(&Category) -> CategoryProperties) -> Self {
        Self {
            categories: RwLock::new(std::collections::HashMap::new()),
            category_props,
        }
    }

    pub async fn register(&self, category: Category, instance: PluginInstance) {
        let mut categories = self.categories.write().await;
        categories.entry(category).or_default().push(instance);
    }

    pub async fn run(&self, flow: Flow, payload: Payload) -> Result<Payload> {
        let categories = self.categories.read().await;
        let mut payload = payload;

        for category in ORDERED_CATEGORIES {
            let Some(instances) = categories.get(category) else {
                continue;
            };
            let active: Vec<&PluginInstance> = instances
                .iter()
                .filter(|instance| active_in_flow(instance.plugin.capabilities(), flow))
                .collect();
            if active.is_empty() {
                continue;
            }

            let props = (self.category_props)(category);
            if props.mode == ExecutionMode::Parallel && props.can_modify {
                return Err(ConduitError::Configuration(format!(
                    "category {category:?} cannot be PARALLEL and can_modify at the same time"
                )));
            }

            match props.mode {
                ExecutionMode::Serial => {
                    for instance in active.iter().copied() {
                        let result = dispatch(instance, flow, payload.clone()).await;
                        match result {
                            Ok(response) => {
                                if !response.continue_ {
                                    return Ok(Payload::Response(response));
                                }
                                if props.can_modify && flow == Flow::Request {
                                    if let Some(modified) = response.modified_request {
                                        payload = Payload::Request(modified);
                                    }
                                }
                            }
                            Err(err) => apply_error_policy(instance, &props, err)?,
                        }
                    }
                }
                ExecutionMode::Parallel => {
                    let mut tasks = Vec::with_capacity(active.len());
                    for instance in active.iter().copied() {
                        let plugin = Arc::clone(&instance.plugin);
                        let payload_for_task = payload.clone();
                        let flow_for_task = flow;
                        tasks.push(tokio::spawn(async move {
                            match flow_for_task {
                                Flow::Request => plugin.handle_request(payload_for_task).await,
                                Flow::Response => plugin.handle_response(payload_for_task).await,
                            }
                        }));
                    }

                    let mut fatal_errors = Vec::new();
                    for (instance, task) in active.iter().copied().zip(tasks) {
                        let result = task
                            .await
                            .map_err(|e| ConduitError::Rpc(format!("plugin task panicked: {e}")))?;
                        if let Err(err) = result {
                            if let Err(fatal) = apply_error_policy(instance, &props, err) {
                                fatal_errors.push(fatal);
                            }
                        }
                    }
                    if !fatal_errors.is_empty() {
                        return Err(ConduitError::from_many(fatal_errors));
                    }
                }
            }
        }

        Ok(payload)
    }

    pub async fn run_request(&self, req: conduit_core::HttpRequest) -> Result<HttpResponse> {
        match self.run(Flow::Request, Payload::Request(req)).await? {
            Payload::Response(resp) => Ok(resp),
            Payload::Request(_) => Ok(HttpResponse::pass_through()),
        }
    }

    pub async fn run_response(&self, resp: HttpResponse) -> Result<HttpResponse> {
        let original = resp.clone();
        match self.run(Flow::Response, Payload::Response(resp)).await? {
            Payload::Response(resp) => Ok(resp),
            Payload::Request(_) => Ok(original),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn active_in_flow(capabilities: &Capabilities, flow: Flow) -> bool {
    capabilities.contains(flow)
}

async fn dispatch(instance: &PluginInstance, flow: Flow, payload: Payload) -> Result<HttpResponse> {
    match flow {
        Flow::Request => instance.plugin.handle_request(payload).await,
        Flow::Response => instance.plugin.handle_response(payload).await,
    }
}

fn apply_error_policy(
    instance: &PluginInstance,
    props: &conduit_core::CategoryProperties,
    err: ConduitError,
) -> Result<()> {
    if instance.required {
        return Err(ConduitError::RequiredPluginFailed {
            plugin: instance.id.clone(),
            source: Box::new(err),
        });
    }
    if props.can_reject {
        return Err(err);
    }
    warn!(plugin = %instance.id, error = %err, "non-required plugin failed; continuing");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{NoopMeter, NoopTracer, Plugin};
    use async_trait::async_trait;
    use conduit_core::{HttpRequest, Metadata, PluginConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-process test double, standing in for an RPC-backed [`Adapter`]
    /// in pipeline tests so they don't need to spawn a real subprocess.
    struct StubPlugin {
        metadata: Metadata,
        capabilities: Capabilities,
        behavior: StubBehavior,
        calls: AtomicUsize,
    }

    enum StubBehavior {
        PassThrough,
        ShortCircuit(u16),
        ModifyRequest(String),
        Fail,
    }

    impl StubPlugin {
        fn new(name: &str, flows: &[Flow], behavior: StubBehavior) -> Arc<Self> {
            Arc::new(Self {
                metadata: Metadata {
                    name: name.to_string(),
                    version: "0.0.0".to_string(),
                    description: String::new(),
                    commit_hash: String::new(),
                    build_date: String::new(),
                },
                capabilities: flows.iter().copied().collect(),
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Plugin for StubPlugin {
        fn metadata(&self) -> &Metadata {
            &self.metadata
        }

        fn capabilities(&self) -> &Capabilities {
            &self.capabilities
        }

        async fn configure(&self, _config: PluginConfig) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }

        async fn ready(&self) -> Result<bool> {
            Ok(true)
        }

        async fn handle_request(&self, payload: Payload) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let req = payload.into_request()?;
            match &self.behavior {
                StubBehavior::PassThrough => Ok(HttpResponse::pass_through()),
                StubBehavior::ShortCircuit(status) => Ok(HttpResponse {
                    status_code: *status,
                    continue_: false,
                    ..Default::default()
                }),
                StubBehavior::ModifyRequest(suffix) => {
                    let mut modified = req.clone();
                    modified.path = format!("{}{}", req.path, suffix);
                    Ok(HttpResponse {
                        continue_: true,
                        modified_request: Some(modified),
                        ..Default::default()
                    })
                }
                StubBehavior::Fail => Err(ConduitError::Rpc("stub failure".to_string())),
            }
        }

        async fn handle_response(&self, payload: Payload) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let resp = payload.into_response()?;
            match &self.behavior {
                StubBehavior::Fail => Err(ConduitError::Rpc("stub failure".to_string())),
                _ => Ok(resp),
            }
        }

        fn tracer(&self) -> NoopTracer {
            NoopTracer
        }

        fn meter(&self) -> NoopMeter {
            NoopMeter
        }
    }

    fn req(path: &str) -> HttpRequest {
        HttpRequest {
            method: "GET".to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn s1_pass_through_with_no_plugins_synthesises_continue() {
        let pipeline = Pipeline::new();
        let resp = pipeline.run_request(req("/x")).await.unwrap();
        assert!(resp.continue_);
    }

    #[tokio::test]
    async fn s2_short_circuit_in_validation_skips_content() {
        let pipeline = Pipeline::new();
        let validator = StubPlugin::new("validator", &[Flow::Request], StubBehavior::ShortCircuit(400));
        let content = StubPlugin::new("content", &[Flow::Request], StubBehavior::PassThrough);
        pipeline
            .register(Category::Validation, PluginInstance::new(validator.clone()))
            .await;
        pipeline
            .register(Category::Content, PluginInstance::new(content.clone()))
            .await;

        let resp = pipeline.run_request(req("/x")).await.unwrap();
        assert_eq!(resp.status_code, 400);
        assert!(!resp.continue_);
        assert_eq!(content.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn s3_content_mutation_chains_to_later_plugins() {
        let pipeline = Pipeline::new();
        let first = StubPlugin::new("rewriter", &[Flow::Request], StubBehavior::ModifyRequest("/rewritten"));
        let observer = StubPlugin::new("observer", &[Flow::Request], StubBehavior::PassThrough);
        pipeline
            .register(Category::Content, PluginInstance::new(first))
            .await;
        pipeline
            .register(Category::Content, PluginInstance::new(observer.clone()))
            .await;

        let resp = pipeline.run_request(req("/orig")).await.unwrap();
        assert!(resp.continue_);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn s4_required_plugin_failure_fails_pipeline_even_when_category_cannot_reject() {
        let pipeline = Pipeline::new();
        let failing = StubPlugin::new("obs", &[Flow::Request], StubBehavior::Fail);
        pipeline
            .register(
                Category::Observability,
                PluginInstance::new(failing).required(true),
            )
            .await;

        let err = pipeline.run(Flow::Request, Payload::Request(req("/x"))).await.unwrap_err();
        assert!(matches!(err, ConduitError::RequiredPluginFailed { .. }));
    }

    #[tokio::test]
    async fn s5_non_required_failure_in_non_rejecting_category_is_swallowed() {
        let pipeline = Pipeline::new();
        let failing = StubPlugin::new("obs-a", &[Flow::Request], StubBehavior::Fail);
        let healthy = StubPlugin::new("obs-b", &[Flow::Request], StubBehavior::PassThrough);
        pipeline
            .register(Category::Observability, PluginInstance::new(failing))
            .await;
        pipeline
            .register(Category::Observability, PluginInstance::new(healthy.clone()))
            .await;

        let resp = pipeline.run_request(req("/x")).await.unwrap();
        assert!(resp.continue_);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_required_failure_in_rejecting_category_fails_pipeline() {
        let pipeline = Pipeline::new();
        let failing = StubPlugin::new("authn", &[Flow::Request], StubBehavior::Fail);
        pipeline
            .register(Category::Authentication, PluginInstance::new(failing))
            .await;

        let err = pipeline.run(Flow::Request, Payload::Request(req("/x"))).await.unwrap_err();
        assert!(matches!(err, ConduitError::Rpc(_)));
    }

    #[test]
    fn the_fixed_category_table_never_pairs_parallel_with_can_modify() {
        // No live category is both PARALLEL and can_modify, which is why
        // the test below has to inject a category-properties override to
        // reach `Pipeline::run`'s guard at all.
        for category in ORDERED_CATEGORIES {
            let props = conduit_core::props_for_category(category);
            assert!(!(props.mode == ExecutionMode::Parallel && props.can_modify), "{category:?}");
        }
    }

    #[tokio::test]
    async fn parallel_category_with_can_modify_is_rejected_as_configuration_error() {
        fn parallel_and_modifiable(_: &Category) -> conduit_core::CategoryProperties {
            conduit_core::CategoryProperties {
                mode: ExecutionMode::Parallel,
                can_reject: false,
                can_modify: true,
            }
        }

        let pipeline = Pipeline::with_category_props(parallel_and_modifiable);
        let plugin = StubPlugin::new("obs", &[Flow::Request], StubBehavior::PassThrough);
        pipeline.register(Category::Observability, PluginInstance::new(plugin)).await;

        let err = pipeline
            .run(Flow::Request, Payload::Request(req("/x")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConduitError::Configuration(_)));
    }

    #[tokio::test]
    async fn plugins_not_declaring_a_flow_are_never_called() {
        let pipeline = Pipeline::new();
        let response_only = StubPlugin::new("resp-only", &[Flow::Response], StubBehavior::PassThrough);
        pipeline
            .register(Category::Content, PluginInstance::new(response_only.clone()))
            .await;

        let _ = pipeline.run_request(req("/x")).await.unwrap();
        assert_eq!(response_only.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn categories_execute_in_fixed_order() {
        let pipeline = Pipeline::new();
        let validation = StubPlugin::new("validator", &[Flow::Request], StubBehavior::ShortCircuit(400));
        let authn = StubPlugin::new("authn", &[Flow::Request], StubBehavior::ShortCircuit(401));
        // Register the later category first to prove ordering is driven by
        // the fixed category table, not registration sequence.
        pipeline
            .register(Category::Validation, PluginInstance::new(validation))
            .await;
        pipeline
            .register(Category::Authentication, PluginInstance::new(authn))
            .await;

        let resp = pipeline.run_request(req("/x")).await.unwrap();
        assert_eq!(resp.status_code, 401);
    }

    #[tokio::test]
    async fn parallel_observability_is_a_no_op_for_the_payload_even_when_short_circuiting() {
        let pipeline = Pipeline::new();
        let obs = StubPlugin::new("obs", &[Flow::Request], StubBehavior::ShortCircuit(500));
        pipeline
            .register(Category::Observability, PluginInstance::new(obs))
            .await;

        let resp = pipeline.run_request(req("/x")).await.unwrap();
        assert!(resp.continue_, "observability cannot short-circuit the pipeline");
    }
}
