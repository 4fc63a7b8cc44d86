use std::borrow::Cow;
use std::iter::{ExactSizeIterator};
use std::io::Stdout;
use std::time::Duration;

use pbr::ProgressBar;

/// Wraps an iterator and draws a progress bar on stdout as it's
/// consumed. With `visible == false` it's a plain pass-through.
pub struct ReportingIterator<I>
  where I: ExactSizeIterator,
{
  name: Cow<'static, str>,
  progress: Option<ProgressBar<Stdout>>,
  inner: I,
}
impl<I> ReportingIterator<I>
  where I: ExactSizeIterator,
{
  pub fn new(inner: I, name: Cow<'static, str>, visible: bool) -> ReportingIterator<I> {
    let progress = if visible {
      let mut p = ProgressBar::new(inner.len() as _);
      p.show_speed = true;
      p.show_percent = true;
      p.show_counter = true;
      p.show_time_left = true;

      let fps = Duration::new(1, 0) / 60;
      p.set_max_refresh_rate(Some(fps));

      let msg = format!("{}: ", name);
      p.message(&msg[..]);
      Some(p)
    } else {
      None
    };

    ReportingIterator {
      name,
      progress,
      inner,
    }
  }
}

impl<I> Iterator for ReportingIterator<I>
  where I: ExactSizeIterator,
{
  type Item = I::Item;
  fn next(&mut self) -> Option<Self::Item> {
    match self.inner.next() {
      Some(v) => {
        if let Some(ref mut p) = self.progress {
          p.inc();
        }
        Some(v)
      },
      None => {
        if let Some(mut p) = self.progress.take() {
          let msg = format!("{} done!\n", self.name);
          p.finish_println(&msg);
        }

        None
      },
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.inner.size_hint()
  }
}
