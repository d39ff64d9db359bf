// QuickJS evaluator
//
// Every fragment runs in a fresh runtime + context. The incoming environment
// is re-created as globals from its JSON form, the fragment runs as a classic
// script, and whatever enumerable globals exist afterwards (minus the ones a
// fresh context already has) become the outgoing environment.

use rquickjs::context::EvalOptions;
use rquickjs::{
    CatchResultExt, CaughtError, Context, Ctx, Function, Object, Runtime, Value as JsValue,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::environment::{Environment, Evaluation};
use super::error::EvaluationError;
use super::Evaluator;

const ENGINE_NAME: &str = "quickjs";

/// Helpers every fragment can reach. Defined before the baseline is taken,
/// so they never leak into the carried environment.
const PRELUDE: &str = r#"
var Tangle = Object.freeze({
    image: function (data, format) {
        return { "$kind": "image", format: format || "png", data: data };
    },
    audio: function (data, format) {
        return { "$kind": "audio", format: format || "ogg", data: data };
    },
    html: function (markup) {
        return { "$kind": "html", html: String(markup) };
    },
});
var console = (function () {
    var emit = function () {
        __tangle_log(Array.prototype.map.call(arguments, String).join(" "));
    };
    return { log: emit, info: emit, warn: emit, error: emit };
})();
var __tangle_encode = function (value) {
    var nonFinite;
    var json = JSON.stringify(value, function (key, v) {
        if (typeof v === "number" && !isFinite(v) && nonFinite === undefined) {
            nonFinite = String(v);
        }
        return v;
    });
    return { json: json, nonFinite: nonFinite };
};
"#;

/// Evaluates fragments as JavaScript with an embedded QuickJS engine
#[derive(Debug, Clone, Default)]
pub struct QuickJsEvaluator {
    timeout: Option<Duration>,
    memory_limit: Option<usize>,
}

impl QuickJsEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort fragments that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap the engine heap at `bytes`
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    fn runtime(&self) -> Result<(Runtime, Option<Instant>), EvaluationError> {
        let runtime = Runtime::new().map_err(runtime_error)?;

        if let Some(limit) = self.memory_limit {
            runtime.set_memory_limit(limit);
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        if let Some(deadline) = deadline {
            runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
        }

        Ok((runtime, deadline))
    }
}

impl Evaluator for QuickJsEvaluator {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn evaluate(
        &self,
        source: &str,
        environment: &Environment,
    ) -> Result<Evaluation, EvaluationError> {
        let (runtime, deadline) = self.runtime()?;
        let context = Context::full(&runtime).map_err(runtime_error)?;

        context.with(|ctx| {
            install_prelude(&ctx)?;

            let globals = ctx.globals();
            let encode: Function = globals.get("__tangle_encode").map_err(runtime_error)?;
            let baseline = enumerable_globals(&ctx)?;

            for (name, value) in environment.iter() {
                let json = serde_json::to_string(value).map_err(runtime_error)?;
                let js = ctx.json_parse(json).catch(&ctx).map_err(exception)?;
                globals.set(name, js).catch(&ctx).map_err(exception)?;
            }

            // Fragments assign bare globals, which strict mode rejects
            let mut options = EvalOptions::default();
            options.strict = false;

            if let Err(err) = ctx
                .eval_with_options::<JsValue, _>(source.as_bytes().to_vec(), options)
                .catch(&ctx)
            {
                if let (Some(deadline), Some(limit)) = (deadline, self.timeout) {
                    if Instant::now() >= deadline {
                        return Err(EvaluationError::Timeout { limit });
                    }
                }
                return Err(exception(err));
            }

            let bindings = snapshot(&ctx, &encode, &baseline)?;
            Ok(Evaluation::from_bindings(bindings))
        })
    }
}

fn install_prelude(ctx: &Ctx<'_>) -> Result<(), EvaluationError> {
    let log = Function::new(ctx.clone(), |message: String| {
        info!(service = "fragment", "{}", message);
    })
    .map_err(runtime_error)?;

    ctx.globals()
        .set("__tangle_log", log)
        .map_err(runtime_error)?;
    ctx.eval::<JsValue, _>(PRELUDE).map_err(runtime_error)?;
    Ok(())
}

fn enumerable_globals(ctx: &Ctx<'_>) -> Result<HashSet<String>, EvaluationError> {
    let mut names = HashSet::new();
    for key in ctx.globals().keys::<String>() {
        names.insert(key.map_err(runtime_error)?);
    }
    Ok(names)
}

/// Collect every global the fragment left behind, in creation order.
///
/// JSON has no Infinity or NaN, so a binding holding one anywhere inside it
/// fails the fragment instead of silently turning into `null`.
fn snapshot<'js>(
    ctx: &Ctx<'js>,
    encode: &Function<'js>,
    baseline: &HashSet<String>,
) -> Result<Environment, EvaluationError> {
    let mut bindings = Environment::new();

    for prop in ctx.globals().props::<String, JsValue>() {
        let (name, value) = prop.map_err(runtime_error)?;
        if baseline.contains(&name) {
            continue;
        }

        let encoded = match encode.call::<_, Object>((value,)).catch(ctx) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(binding = %name, "Dropping binding that cannot be serialized: {}", e);
                continue;
            }
        };

        if let Some(value) = encoded
            .get::<_, Option<String>>("nonFinite")
            .map_err(runtime_error)?
        {
            return Err(EvaluationError::NonFinite {
                binding: name,
                value,
            });
        }

        match encoded
            .get::<_, Option<String>>("json")
            .map_err(runtime_error)?
        {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => bindings.insert(name, value),
                Err(e) => warn!(binding = %name, "Dropping binding with invalid JSON form: {}", e),
            },
            None => {
                debug!(binding = %name, "Dropping binding without a JSON form");
            }
        }
    }

    Ok(bindings)
}

fn runtime_error(err: impl std::fmt::Display) -> EvaluationError {
    EvaluationError::Runtime {
        engine: ENGINE_NAME.to_string(),
        message: err.to_string(),
    }
}

fn exception(err: CaughtError<'_>) -> EvaluationError {
    match err {
        CaughtError::Exception(ex) => EvaluationError::Exception {
            message: ex.message().unwrap_or_else(|| ex.to_string()),
            stack: ex.stack(),
        },
        other => EvaluationError::Exception {
            message: other.to_string(),
            stack: None,
        },
    }
}
