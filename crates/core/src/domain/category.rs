/// Closed set of line categories the exporters know how to format. Anything else
/// is carried through as `Other` with its original tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LineCategory {
    Hotel,
    NewHotel,
    Activity,
    NewService,
    Flight,
    Train,
    Ferry,
    CarRental,
    PrivateTransfer,
    TripInfo,
    Internal,
    Cost,
    Other(String),
    Uncategorized,
}

impl LineCategory {
    pub fn parse(tag: Option<&str>) -> Self {
        let Some(raw) = tag.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::Uncategorized;
        };

        match raw.to_ascii_lowercase().as_str() {
            "hotel" => Self::Hotel,
            "new hotel" => Self::NewHotel,
            "activity" => Self::Activity,
            "new service" => Self::NewService,
            "flight" => Self::Flight,
            "train" => Self::Train,
            "ferry" => Self::Ferry,
            "car rental" => Self::CarRental,
            "private transfer" => Self::PrivateTransfer,
            "trip info" => Self::TripInfo,
            "internal" => Self::Internal,
            "cost" => Self::Cost,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Lines that count toward purchase and sell totals.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::TripInfo | Self::Internal)
    }

    /// Staff-only lines never reach client documents.
    pub fn is_internal_only(&self) -> bool {
        matches!(self, Self::Internal | Self::Cost)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Flight | Self::Train | Self::Ferry)
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::Hotel => "Hotel",
            Self::NewHotel => "New Hotel",
            Self::Activity => "Activity",
            Self::NewService => "New Service",
            Self::Flight => "Flight",
            Self::Train => "Train",
            Self::Ferry => "Ferry",
            Self::CarRental => "Car Rental",
            Self::PrivateTransfer => "Private Transfer",
            Self::TripInfo => "Trip info",
            Self::Internal => "Internal",
            Self::Cost => "Cost",
            Self::Other(tag) => tag,
            Self::Uncategorized => "",
        }
    }
}
