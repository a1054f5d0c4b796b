//! Call-site identifier -> metric name normalization.

/// Convert a qualified method path into a dotted, lowercase metric name.
///
/// `::`, `\`, `/` and `_` all become `.`, then the whole name is lowercased.
/// With `instance_type`, everything before the last `::` is replaced by that
/// type's name, so a method inherited from a base type is reported under the
/// type it actually ran on. A non-empty `suffix` is appended verbatim as
/// `.<suffix>`.
///
/// `Data_Dao::getUserFieldTypes` becomes `data.dao.getuserfieldtypes`.
pub fn method_to_metric(
    qualified: &str,
    suffix: Option<&str>,
    instance_type: Option<&str>,
) -> String {
    let joined;
    let name = match instance_type.filter(|t| !t.is_empty()) {
        Some(ty) => {
            let method = qualified
                .rsplit_once("::")
                .map(|(_, m)| m)
                .unwrap_or(qualified);
            joined = format!("{}.{}", strip_generics(ty), method);
            joined.as_str()
        }
        None => qualified,
    };

    let mut out = name
        .replace("::", ".")
        .replace(['_', '\\', '/'], ".")
        .to_lowercase();

    if let Some(sfx) = suffix.filter(|s| !s.is_empty()) {
        out.push('.');
        out.push_str(sfx);
    }
    out
}

/// Fully qualified name of `T`, generic arguments removed.
pub fn type_name_of<T: ?Sized>() -> &'static str {
    strip_generics(std::any::type_name::<T>())
}

fn strip_generics(mut ty: &str) -> &str {
    // References, raw pointers and trait objects name the type they wrap.
    const WRAPPERS: [&str; 5] = ["&mut ", "&", "*const ", "*mut ", "dyn "];
    while let Some(rest) = WRAPPERS.iter().find_map(|w| ty.strip_prefix(w)) {
        ty = rest;
    }
    let end = [ty.find('<'), ty.find(" + ")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(ty.len());
    &ty[..end]
}

#[doc(hidden)]
pub fn type_name_of_val<T>(_: T) -> &'static str {
    std::any::type_name::<T>()
}

#[doc(hidden)]
pub fn enclosing_path(marker: &'static str) -> &'static str {
    let mut path = marker.strip_suffix("::__marker").unwrap_or(marker);
    while let Some(p) = path.strip_suffix("::{{closure}}") {
        path = p;
    }
    path
}

/// Qualified path of the enclosing function, e.g. `my_app::db::load_user`.
///
/// Meant to be fed to [`method_to_metric`] or
/// [`MetricStore::time_method`](crate::MetricStore::time_method).
#[macro_export]
macro_rules! method_path {
    () => {{
        fn __marker() {}
        $crate::naming::enclosing_path($crate::naming::type_name_of_val(__marker))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_colon_and_underscore_become_dots() {
        assert_eq!(method_to_metric("Foo::bar_baz", None, None), "foo.bar.baz");
        assert_eq!(
            method_to_metric("Foo::bar_baz", Some("x"), None),
            "foo.bar.baz.x"
        );
    }

    #[test]
    fn backslash_and_slash_namespaces() {
        assert_eq!(
            method_to_metric(r"Moar\Metrics\Track::timeMethod", None, None),
            "moar.metrics.track.timemethod"
        );
        assert_eq!(method_to_metric("svc/Api::get", None, None), "svc.api.get");
    }

    #[test]
    fn suffix_is_not_normalized() {
        assert_eq!(
            method_to_metric("A::b", Some("Cache_Miss"), None),
            "a.b.Cache_Miss"
        );
        assert_eq!(method_to_metric("A::b", Some(""), None), "a.b");
    }

    #[test]
    fn instance_type_replaces_owner() {
        assert_eq!(
            method_to_metric("base::Repo::find_one", None, Some("app::UserRepo")),
            "app.userrepo.find.one"
        );
        assert_eq!(
            method_to_metric("run", Some("t"), Some("Job<u8>")),
            "job.run.t"
        );
    }

    struct Widget;

    #[test]
    fn type_name_drops_generics() {
        assert!(type_name_of::<Widget>().ends_with("naming::tests::Widget"));
        assert_eq!(type_name_of::<Vec<u8>>(), "alloc::vec::Vec");
    }

    trait Shape {}

    #[test]
    fn wrapper_types_name_the_inner_type() {
        let dyn_name = type_name_of::<dyn Shape>();
        assert!(dyn_name.ends_with("naming::tests::Shape"), "{dyn_name}");
        assert!(!dyn_name.contains(' '), "{dyn_name}");
        assert!(type_name_of::<dyn Shape + Send>().ends_with("naming::tests::Shape"));
        assert!(type_name_of::<&mut Widget>().ends_with("naming::tests::Widget"));
        assert!(type_name_of::<*const Widget>().ends_with("naming::tests::Widget"));

        assert_eq!(
            method_to_metric("draw", None, Some("dyn app::Shape")),
            "app.shape.draw"
        );
        assert_eq!(
            method_to_metric("draw", None, Some("*mut app::Shape")),
            "app.shape.draw"
        );
    }

    #[test]
    fn method_path_names_enclosing_fn() {
        let p = crate::method_path!();
        assert!(p.ends_with("tests::method_path_names_enclosing_fn"), "{p}");
    }
}
