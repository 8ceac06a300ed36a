use std::{cell::RefCell, ffi::OsStr};

use log::warn;

use crate::features::Features;

#[derive(Clone, Copy, Debug)]
struct Env {
    features: Features,
    step_limit: Option<u64>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from the process environment.
///
/// - `LC3VM_FEATURES`: feature list, see [`Features`]
/// - `LC3VM_STEP_LIMIT`: maximum instructions executed before a run is stopped
pub fn init() {
    let features = var("LC3VM_FEATURES")
        .and_then(|list| {
            list.parse::<Features>()
                .map_err(|err| warn!("Ignoring LC3VM_FEATURES: {err}"))
                .ok()
        })
        .unwrap_or_default();
    let step_limit = var("LC3VM_STEP_LIMIT").and_then(|limit| {
        limit
            .parse::<u64>()
            .map_err(|err| warn!("Ignoring LC3VM_STEP_LIMIT: {err}"))
            .ok()
    });
    set_env(Env {
        features,
        step_limit,
    });
}

pub fn features() -> Features {
    with_env(|env| env.features)
}

pub fn step_limit() -> Option<u64> {
    with_env(|env| env.step_limit)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var(name: impl AsRef<OsStr>) -> Option<String> {
    std::env::var(name.as_ref()).ok().filter(|v| !v.is_empty())
}
