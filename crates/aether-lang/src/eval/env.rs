use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::ast::{IdentName, Params, Program};
use crate::value::Value;

pub(crate) type SharedEnv = Arc<RwLock<Env>>;

/// A user-defined function captured at definition time.
///
/// Bodies run in a fresh scope chained to the global environment, not
/// to the defining scope. Functions are not first-class values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FuncDef {
    pub name: IdentName,
    pub params: Params,
    pub body: Program,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    Value(Value),
    Function(Arc<FuncDef>),
}

#[derive(Debug, Default)]
pub(crate) struct Env {
    context: FxHashMap<IdentName, Binding>,
    parent: Option<SharedEnv>,
}

impl Env {
    pub(crate) fn new() -> SharedEnv {
        Arc::new(RwLock::new(Self::default()))
    }

    pub(crate) fn with_parent(parent: SharedEnv) -> SharedEnv {
        Arc::new(RwLock::new(Self {
            context: FxHashMap::default(),
            parent: Some(parent),
        }))
    }

    pub(crate) fn define(&mut self, name: IdentName, binding: Binding) {
        self.context.insert(name, binding);
    }

    pub(crate) fn clear(&mut self) {
        self.context.clear();
    }
}

/// Walks the scope chain and returns the nearest binding for `name`.
pub(crate) fn resolve(env: &SharedEnv, name: &str) -> Option<Binding> {
    let guard = env.read().unwrap();
    match guard.context.get(name) {
        Some(binding) => Some(binding.clone()),
        None => {
            let parent = guard.parent.clone()?;
            drop(guard);
            resolve(&parent, name)
        }
    }
}

/// Assigns `value` to the scope where `name` is already bound, or
/// defines it in `env` itself when no scope in the chain binds it.
pub(crate) fn assign(env: &SharedEnv, name: &IdentName, value: Value) {
    if try_assign(env, name, &value) {
        return;
    }

    env.write()
        .unwrap()
        .define(name.clone(), Binding::Value(value));
}

fn try_assign(env: &SharedEnv, name: &IdentName, value: &Value) -> bool {
    let mut guard = env.write().unwrap();
    if guard.context.contains_key(name) {
        guard
            .context
            .insert(name.clone(), Binding::Value(value.clone()));
        return true;
    }

    let parent = guard.parent.clone();
    drop(guard);

    match parent {
        Some(parent) => try_assign(&parent, name, value),
        None => false,
    }
}
