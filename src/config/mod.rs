mod settings;

pub use settings::{
    DispatchConfig, OtelConfig, ProviderConfig, Settings, TransportFailurePolicy,
};
