pub mod acquisition_service;

pub use acquisition_service::{
    render_json, AcquisitionService, FetchOptions, HistoryQuery, IndicatorQuery, ServiceSettings,
};
