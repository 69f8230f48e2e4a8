//! Declarative macros shared across the crate

/// Define a fieldless enum whose variants carry a display label
///
/// # Example
/// ```
/// use raplcap::labeled_enum;
///
/// labeled_enum! {
///     pub enum Domain {
///         Package => "Package energy",
///         Uncore => "PowerPlane1 (uncore)",
///     }
/// }
///
/// assert_eq!(Domain::Uncore.name(), "PowerPlane1 (uncore)");
/// assert_eq!(Domain::Package.to_string(), "Package energy");
/// assert_eq!(Domain::all(), vec![Domain::Package, Domain::Uncore]);
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - `name(&self) -> &'static str` returning the label
/// - `all() -> Vec<Self>` in declaration order
/// - `Display` printing the label
#[macro_export]
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $label:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
