use super::connection::ConnectionState;
use super::history::TrendSnapshot;
use super::{LogLine, MonitorEvent, Sample};
use tokio::sync::mpsc;

/// Consumer of monitor events. Runs on its own task, one event at a time, in
/// the order the poll loop and dispatcher produced them.
pub trait Presenter: Send {
    fn on_sample(&mut self, sample: &Sample, trend: &TrendSnapshot);

    fn on_connection(&mut self, _state: ConnectionState) {}

    fn on_log(&mut self, _line: &LogLine) {}
}

/// Deliver events until every producer is gone, then hand the presenter back.
pub async fn run_presenter<P: Presenter>(
    mut events: mpsc::UnboundedReceiver<MonitorEvent>,
    mut presenter: P,
) -> P {
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::Sample { sample, trend } => presenter.on_sample(&sample, &trend),
            MonitorEvent::Connection(state) => presenter.on_connection(state),
            MonitorEvent::Log(line) => presenter.on_log(&line),
        }
    }
    presenter
}
