/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_session_registered(&self);
    fn report_session_removed(&self);
    fn report_session_evicted(&self);
    fn report_session_failed(&self);
    fn report_negotiation_failed(&self);
    fn report_snapshot_written(&self);
    fn report_snapshot_failed(&self);
}
