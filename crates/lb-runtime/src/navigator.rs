use lb_core::literal::format_number;
use lb_core::PathExpression;
use mlua::{Lua, Table as LuaTable, Value as LuaValue};
use tracing::trace;

/// Walks `path` from the globals, creating any missing table along the way, and
/// returns the table its leaf belongs in.
///
/// An intermediate that exists but is not a table is replaced by a fresh table;
/// the old value is lost.
pub(crate) fn navigate_for_write(lua: &Lua, path: &PathExpression) -> mlua::Result<LuaTable> {
    let globals = lua.globals();
    let Some((first, rest)) = path.segments().split_first() else {
        return Ok(globals);
    };

    let mut current = match globals.get::<LuaValue>(first.as_str())? {
        LuaValue::Table(table) => table,
        previous => {
            trace!(segment = %first, previous = previous.type_name(), "installing global table");
            let table = lua.create_table()?;
            globals.set(first.as_str(), table.clone())?;
            table
        }
    };

    for segment in rest {
        current = match find_child_table(&current, segment)? {
            Some(child) => child,
            None => {
                trace!(segment = %segment, "installing nested table");
                let child = lua.create_table()?;
                current.set(segment.as_str(), child.clone())?;
                child
            }
        };
    }

    Ok(current)
}

/// Same walk as [`navigate_for_write`] without creating anything. `None` when a
/// segment is missing or does not hold a table.
pub(crate) fn navigate_for_read(lua: &Lua, path: &PathExpression) -> mlua::Result<Option<LuaTable>> {
    let globals = lua.globals();
    let Some((first, rest)) = path.segments().split_first() else {
        return Ok(Some(globals));
    };

    let LuaValue::Table(mut current) = globals.get::<LuaValue>(first.as_str())? else {
        return Ok(None);
    };

    for segment in rest {
        match find_child_table(&current, segment)? {
            Some(child) => current = child,
            None => {
                trace!(path = %path, segment = %segment, "path does not resolve");
                return Ok(None);
            }
        }
    }

    Ok(Some(current))
}

/// Resolves the runtime value stored at `path`, if the path leads anywhere.
pub(crate) fn resolve(lua: &Lua, path: &PathExpression) -> mlua::Result<Option<LuaValue>> {
    match navigate_for_read(lua, path)? {
        Some(table) => table.get::<LuaValue>(path.leaf()).map(Some),
        None => Ok(None),
    }
}

/// Finds an entry of `parent` whose key reads as `segment` and whose value is a
/// table. String keys are looked up directly; number keys match through their
/// textual form, so `list.1` reaches `list[1]`.
fn find_child_table(parent: &LuaTable, segment: &str) -> mlua::Result<Option<LuaTable>> {
    if let LuaValue::Table(child) = parent.raw_get::<LuaValue>(segment)? {
        return Ok(Some(child));
    }

    for pair in parent.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair?;
        let LuaValue::Table(child) = value else {
            continue;
        };
        if number_key_reads_as(&key, segment) {
            return Ok(Some(child));
        }
    }

    Ok(None)
}

fn number_key_reads_as(key: &LuaValue, segment: &str) -> bool {
    match key {
        LuaValue::Integer(integer) => integer.to_string() == segment,
        LuaValue::Number(number) => format_number(*number) == segment,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> PathExpression {
        PathExpression::parse(text)
    }

    #[test]
    fn write_navigation_creates_missing_tables() {
        let lua = Lua::new();
        let target = navigate_for_write(&lua, &path("a.b.c")).expect("navigate");
        target.set("c", 5).expect("set leaf");

        let value: i64 = lua.load("return a.b.c").eval().expect("eval");
        assert_eq!(value, 5);
    }

    #[test]
    fn write_navigation_reuses_existing_tables() {
        let lua = Lua::new();
        lua.load("a = { b = { keep = true } }").exec().expect("seed");
        let target = navigate_for_write(&lua, &path("a.b.c")).expect("navigate");
        target.set("c", 1).expect("set leaf");

        let kept: bool = lua.load("return a.b.keep").eval().expect("eval");
        assert!(kept);
    }

    #[test]
    fn write_navigation_replaces_non_table_intermediates() {
        let lua = Lua::new();
        lua.load("a = 7; b = { c = 'text' }").exec().expect("seed");
        navigate_for_write(&lua, &path("a.x")).expect("navigate global");
        navigate_for_write(&lua, &path("b.c.d")).expect("navigate nested");

        let kinds: (String, String) = lua
            .load("return type(a), type(b.c)")
            .eval()
            .expect("eval");
        assert_eq!(kinds, ("table".to_string(), "table".to_string()));
    }

    #[test]
    fn bare_names_resolve_to_globals() {
        let lua = Lua::new();
        let target = navigate_for_write(&lua, &path("flag")).expect("navigate");
        target.set("flag", true).expect("set");
        let value = resolve(&lua, &path("flag")).expect("resolve");
        assert!(matches!(value, Some(LuaValue::Boolean(true))));
    }

    #[test]
    fn read_navigation_never_creates() {
        let lua = Lua::new();
        lua.load("a = { b = 1 }").exec().expect("seed");
        assert!(navigate_for_read(&lua, &path("missing.x")).expect("read").is_none());
        assert!(navigate_for_read(&lua, &path("a.b.c")).expect("read").is_none());

        let missing: bool = lua.load("return missing == nil").eval().expect("eval");
        assert!(missing);
    }

    #[test]
    fn number_keys_are_reachable_by_their_text() {
        let lua = Lua::new();
        lua.load("list = { { name = 'first' }, [2.5] = { name = 'half' } }")
            .exec()
            .expect("seed");
        let first = resolve(&lua, &path("list.1.name")).expect("resolve");
        assert!(matches!(first, Some(LuaValue::String(name)) if name.to_string_lossy() == "first"));

        // A dot inside a key cannot be addressed: "2.5" splits into two segments.
        let half = resolve(&lua, &path("list.2.5.name")).expect("resolve");
        assert!(half.is_none());
    }
}
