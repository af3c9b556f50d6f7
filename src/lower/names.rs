use crate::ir::{FuncId, GlobalId, Linkage, Module};
use crate::options::Options;

pub(crate) const DEFAULT_FUNCNAME_PREFIX: &str = "func_";
pub(crate) const DEFAULT_TABLE_PREFIX: &str = "table_";
pub(crate) const DEFAULT_GLOBAL_PREFIX: &str = "__notdec_global_";
pub(crate) const DEFAULT_MEM_NAME: &str = "__notdec_mem0";

pub(crate) const LOCAL_PREFIX: &str = "_local_";
pub(crate) const ARG_PREFIX: &str = "_arg_";
pub(crate) const PARAM_PREFIX: &str = "_param_";

/// Strips a single leading `$` from a symbol name.
pub(crate) fn remove_dollar(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}

/// Applies the dollar-strip policy to a declared name.
pub(crate) fn declared_name<'a>(name: &'a str, opts: &Options) -> &'a str {
    if opts.no_remove_dollar {
        name
    } else {
        remove_dollar(name)
    }
}

/// Clears the name of whatever function or global currently holds `name`.
/// Collisions resolve by eviction, never by suffixing; later passes rely
/// on the new holder owning the name outright.
pub(crate) fn evict_name(module: &mut Module, name: &str) {
    if let Some(prev) = module.function_by_name(name) {
        module.function_mut(prev).set_name("");
    }
    if let Some(prev) = module.global_by_name(name) {
        module.global_mut(prev).set_name("");
    }
}

/// Entry-point and libc-collision rewrites applied to a newly declared
/// function.
pub(crate) fn fix_declared_func_name(module: &mut Module, id: FuncId, opts: &Options) {
    let name = module.function(id).name().to_string();
    if opts.fix_names {
        if name == "__original_main" || name == "__main_argc_argv" {
            module.function_mut(id).set_linkage(Linkage::External);
            evict_name(module, "main");
            module.function_mut(id).set_name("main");
        }
        // TODO principled fix for libc collisions (weak linkage or a
        // separate namespace) instead of the `_1` suffix.
        if name == "memset" {
            module.function_mut(id).set_name("memset_1");
        }
        if name == "memcpy" {
            module.function_mut(id).set_name("memcpy_1");
        }
    } else if name == "main" {
        module.function_mut(id).set_linkage(Linkage::External);
    }
}

/// Export-name policy for an exported function: with `force_export_name`
/// the export name always wins (evicting any holder); otherwise it is
/// adopted only when the function is still unnamed.
pub(crate) fn apply_export_name_func(
    module: &mut Module,
    id: FuncId,
    export_name: &str,
    opts: &Options,
) {
    if export_name.is_empty() {
        return;
    }
    if opts.force_export_name {
        if module.function_by_name(export_name) != Some(id) {
            evict_name(module, export_name);
        }
        module.function_mut(id).set_name(export_name);
    } else if module.function(id).name().is_empty() {
        module.function_mut(id).set_name(export_name);
    }
}

/// Export-name policy for exported memories and globals; same rules as for
/// functions.
pub(crate) fn apply_export_name_global(
    module: &mut Module,
    id: GlobalId,
    export_name: &str,
    opts: &Options,
) {
    if export_name.is_empty() {
        return;
    }
    if opts.force_export_name {
        if module.global_by_name(export_name) != Some(id) {
            evict_name(module, export_name);
        }
        module.global_mut(id).set_name(export_name);
    } else if module.global(id).name().is_empty() {
        module.global_mut(id).set_name(export_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_stripping() {
        assert_eq!(remove_dollar("$foo"), "foo");
        assert_eq!(remove_dollar("foo"), "foo");
        assert_eq!(remove_dollar(""), "");
        // Only the leading dollar goes.
        assert_eq!(remove_dollar("$$foo"), "$foo");
    }

    #[test]
    fn declared_name_is_idempotent() {
        let opts = Options::default();
        let once = declared_name("$foo", &opts);
        assert_eq!(declared_name(once, &opts), once);
    }
}
