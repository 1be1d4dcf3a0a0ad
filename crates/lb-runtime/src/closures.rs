use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use lb_core::{BridgeError, Value};
use mlua::{Function, Lua, MultiValue};
use tracing::trace;

use crate::error_map::into_lua_error;
use crate::marshal::{pull_arguments, Pusher};

/// A host callable exposed to scripts.
pub type HostFunction = Rc<dyn Fn(Vec<Value>) -> Result<Vec<Value>, BridgeError>>;

/// Stable identifier of a registered closure. Trampolines hold a handle, not the
/// closure, so replacing a registration is seen by every trampoline for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureHandle(u64);

impl ClosureHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Closures registered with one interpreter, keyed by their install path.
#[derive(Default)]
pub struct ClosureRegistry {
    next_id: u64,
    handles: BTreeMap<String, ClosureHandle>,
    closures: HashMap<ClosureHandle, HostFunction>,
}

impl ClosureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `closure` under `name`. A name registered before keeps its handle
    /// and the new closure replaces the old one.
    pub fn register(&mut self, name: &str, closure: HostFunction) -> ClosureHandle {
        let handle = match self.handles.get(name) {
            Some(handle) => *handle,
            None => {
                self.next_id += 1;
                let handle = ClosureHandle(self.next_id);
                self.handles.insert(name.to_string(), handle);
                handle
            }
        };
        self.closures.insert(handle, closure);
        handle
    }

    /// The closure currently registered under `name`, with its handle.
    pub fn entry(&self, name: &str) -> Option<(ClosureHandle, HostFunction)> {
        let handle = self.handle(name)?;
        self.resolve(handle).map(|closure| (handle, closure))
    }

    /// Puts back what [`ClosureRegistry::entry`] returned before a failed
    /// registration. `None` forgets the name.
    pub fn restore(&mut self, name: &str, previous: Option<(ClosureHandle, HostFunction)>) {
        match previous {
            Some((handle, closure)) => {
                self.handles.insert(name.to_string(), handle);
                self.closures.insert(handle, closure);
            }
            None => {
                if let Some(handle) = self.handles.remove(name) {
                    self.closures.remove(&handle);
                }
            }
        }
    }

    pub fn resolve(&self, handle: ClosureHandle) -> Option<HostFunction> {
        self.closures.get(&handle).cloned()
    }

    pub fn handle(&self, name: &str) -> Option<ClosureHandle> {
        self.handles.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.is_empty()
    }
}

impl fmt::Debug for ClosureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureRegistry")
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}

fn resolve_live(
    registry: &Weak<RefCell<ClosureRegistry>>,
    handle: ClosureHandle,
) -> Option<HostFunction> {
    let registry = registry.upgrade()?;
    let closure = registry.borrow().resolve(handle);
    closure
}

/// Builds the native function installed in the runtime for `handle`.
///
/// On each call it marshals the arguments, resolves the handle to whatever
/// closure is registered at that moment, runs it, and pushes its results back
/// as the call's return values. Any failure is raised as a script error.
pub(crate) fn build_trampoline(
    lua: &Lua,
    registry: Weak<RefCell<ClosureRegistry>>,
    handle: ClosureHandle,
    name: String,
    max_depth: usize,
) -> mlua::Result<Function> {
    lua.create_function(move |lua, args: MultiValue| {
        let arguments = pull_arguments(args, &name, max_depth).map_err(into_lua_error)?;

        let closure = resolve_live(&registry, handle).ok_or_else(|| {
            into_lua_error(BridgeError::new(
                "RUNTIME_CLOSED",
                format!("closure '{}' is no longer registered", name),
            ))
        })?;

        trace!(function = %name, argc = arguments.len(), "calling host closure");
        let results = closure(arguments).map_err(into_lua_error)?;

        Pusher::new(lua, max_depth)
            .push_all(&results)
            .map_err(|error| {
                into_lua_error(BridgeError::new(
                    error.code,
                    format!("result of '{}': {}", name, error.message),
                ))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f64) -> HostFunction {
        Rc::new(move |_args: Vec<Value>| -> Result<Vec<Value>, BridgeError> {
            Ok(vec![Value::Number(value)])
        })
    }

    #[test]
    fn registering_a_name_twice_keeps_its_handle() {
        let mut registry = ClosureRegistry::new();
        let first = registry.register("ns.fn", constant(1.0));
        let other = registry.register("ns.other", constant(2.0));
        let second = registry.register("ns.fn", constant(3.0));

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.handle("ns.fn"), Some(first));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ns.fn", "ns.other"]);

        let closure = registry.resolve(first).expect("registered");
        assert_eq!(closure(Vec::new()), Ok(vec![Value::Number(3.0)]));
    }

    #[test]
    fn restoring_undoes_a_registration() {
        let mut registry = ClosureRegistry::new();
        let kept = registry.register("kept", constant(1.0));

        let previous = registry.entry("kept");
        registry.register("kept", constant(2.0));
        registry.restore("kept", previous);
        let closure = registry.resolve(kept).expect("still registered");
        assert_eq!(closure(Vec::new()), Ok(vec![Value::Number(1.0)]));

        let previous = registry.entry("fresh");
        registry.register("fresh", constant(3.0));
        registry.restore("fresh", previous);
        assert_eq!(registry.handle("fresh"), None);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["kept"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn trampoline_resolves_the_current_closure() {
        let lua = Lua::new();
        let registry = Rc::new(RefCell::new(ClosureRegistry::new()));
        let handle = registry.borrow_mut().register("answer", constant(1.0));
        let function = build_trampoline(&lua, Rc::downgrade(&registry), handle, "answer".into(), 8)
            .expect("trampoline");
        lua.globals().set("answer", function).expect("install");

        let first: f64 = lua.load("return answer()").eval().expect("call");
        registry.borrow_mut().register("answer", constant(2.0));
        let second: f64 = lua.load("return answer()").eval().expect("call");

        assert_eq!((first, second), (1.0, 2.0));
    }

    #[test]
    fn trampoline_fails_once_the_registry_is_gone() {
        let lua = Lua::new();
        let registry = Rc::new(RefCell::new(ClosureRegistry::new()));
        let handle = registry.borrow_mut().register("gone", constant(1.0));
        let function = build_trampoline(&lua, Rc::downgrade(&registry), handle, "gone".into(), 8)
            .expect("trampoline");
        lua.globals().set("gone", function).expect("install");
        drop(registry);

        let error = lua.load("gone()").exec().expect_err("released registry");
        assert!(error.to_string().contains("RUNTIME_CLOSED"));
    }
}
