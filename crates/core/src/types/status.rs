//! Choice enums for MakerDB entities.
//!
//! Wire values (JSON and the `PostgreSQL` enum labels) are lowercase
//! kebab-case, e.g. `sub-assembly` or `in-production`.

/// Define a choice enum with its wire representation.
///
/// Generates `as_str`, `ALL`, `Display` and `FromStr`, plus `sqlx::Type`
/// against the named `PostgreSQL` enum when the `postgres` feature is enabled.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $pg_type:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(type_name = $pg_type, rename_all = "kebab-case"))]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire value of this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(format!(
                        "invalid {}: {s} (expected one of: {})",
                        stringify!($name),
                        Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                    )),
                }
            }
        }
    };
}

choice_enum! {
    /// Kind of part.
    #[derive(Default)]
    PartType, "part_type" {
        /// Built in-house from a project BOM.
        SubAssembly => "sub-assembly",
        /// Groups interchangeable parts.
        Meta => "meta",
        /// Mirrors a part from an external catalogue.
        Linked => "linked",
        /// Plain locally managed part.
        #[default]
        Local => "local",
    }
}

choice_enum! {
    /// Status of a stock entry.
    ///
    /// An entry without a status, or with [`StockStatus::Available`], is on hand.
    StockStatus, "stock_status" {
        Ordered => "ordered",
        Reserved => "reserved",
        Allocated => "allocated",
        InProduction => "in-production",
        InTransit => "in-transit",
        Planned => "planned",
        Rejected => "rejected",
        BeingOrdered => "being-ordered",
        Available => "available",
    }
}

impl StockStatus {
    /// Whether stock with this status counts toward on-hand totals.
    #[must_use]
    pub const fn is_on_hand(self) -> bool {
        matches!(self, Self::Available)
    }
}

choice_enum! {
    /// Procurement order status.
    #[derive(Default)]
    OrderStatus, "order_status" {
        #[default]
        Open => "open",
        Ordered => "ordered",
        Received => "received",
    }
}

choice_enum! {
    /// Where a vendor offer comes from.
    #[derive(Default)]
    OfferType, "offer_type" {
        #[default]
        Local => "local",
        Online => "online",
        Service => "service",
    }
}

choice_enum! {
    /// Vendor-reported availability of an offer.
    InStockStatus, "in_stock_status" {
        Yes => "yes",
        No => "no",
        Maybe => "maybe",
        Assumed => "assumed",
    }
}

choice_enum! {
    /// Project lifecycle status.
    #[derive(Default)]
    ProjectStatus, "project_status" {
        #[default]
        Draft => "draft",
        Active => "active",
        Archived => "archived",
    }
}

choice_enum! {
    /// Kind of file attached to an entity.
    #[derive(Default)]
    AttachmentType, "attachment_type" {
        Image => "image",
        Datasheet => "datasheet",
        Cad => "cad",
        Gerbers => "gerbers",
        KicadPcb => "kicad-pcb",
        EagleBrd => "eagle-brd",
        Invoice => "invoice",
        PurchaseOrder => "purchase-order",
        ShippingList => "shipping-list",
        #[default]
        Other => "other",
    }
}

choice_enum! {
    /// Entity kinds that can own attachments.
    AttachmentOwner, "attachment_owner" {
        Part => "part",
        Storage => "storage",
        Lot => "lot",
        Order => "order",
        Offer => "offer",
        Project => "project",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values_match_serde() {
        for status in StockStatus::ALL {
            let json = serde_json::to_string(status).expect("serialize");
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for kind in AttachmentType::ALL {
            let json = serde_json::to_string(kind).expect("serialize");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_kebab_case_variants() {
        assert_eq!(PartType::SubAssembly.as_str(), "sub-assembly");
        assert_eq!(StockStatus::InProduction.as_str(), "in-production");
        assert_eq!(AttachmentType::KicadPcb.as_str(), "kicad-pcb");
        assert_eq!(
            "being-ordered".parse::<StockStatus>(),
            Ok(StockStatus::BeingOrdered)
        );
    }

    #[test]
    fn test_from_str_error_lists_choices() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert!(err.contains("open, ordered, received"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PartType::default(), PartType::Local);
        assert_eq!(OrderStatus::default(), OrderStatus::Open);
        assert_eq!(ProjectStatus::default(), ProjectStatus::Draft);
        assert_eq!(OfferType::default(), OfferType::Local);
        assert_eq!(AttachmentType::default(), AttachmentType::Other);
    }

    #[test]
    fn test_only_available_status_is_on_hand() {
        let on_hand: Vec<_> = StockStatus::ALL
            .iter()
            .filter(|s| s.is_on_hand())
            .collect();
        assert_eq!(on_hand, vec![&StockStatus::Available]);
    }
}
