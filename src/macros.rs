/// Build an [`Attributes`](crate::domain::Attributes) map.
///
/// ```ignore
/// let a = attrs! { "id" => 1, "class" => "container" };
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::domain::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attributes = $crate::domain::Attributes::new();
        $(
            attributes.insert(
                ::std::string::String::from($key),
                $crate::domain::Value::from($value),
            );
        )+
        attributes
    }};
}
