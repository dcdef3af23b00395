//! Optimistic updates: apply a local transition, issue the remote call, and
//! apply the inverse transition if the call fails.

/// A reversible change to local state.
pub trait Transition<S> {
    fn apply(&self, state: &mut S);
    fn invert(&self, state: &mut S);
}

/// Adds to a counter; the inverse subtracts, saturating at zero.
#[derive(Debug, Clone, Copy)]
pub struct Increment(pub u64);

impl Transition<u64> for Increment {
    fn apply(&self, state: &mut u64) {
        *state = state.saturating_add(self.0);
    }

    fn invert(&self, state: &mut u64) {
        *state = state.saturating_sub(self.0);
    }
}

/// Applies `transition` to `state`, then runs `remote`. On failure the
/// inverse transition is applied before the error is returned. The remote
/// call is never retried.
pub fn run_optimistic<S, X, T, E>(
    state: &mut S,
    transition: &X,
    remote: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    X: Transition<S>,
{
    transition.apply(state);
    match remote() {
        Ok(value) => Ok(value),
        Err(e) => {
            transition.invert(state);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_keeps_the_local_change() {
        let mut likes = 3u64;
        let result: Result<(), ()> = run_optimistic(&mut likes, &Increment(1), || Ok(()));
        assert!(result.is_ok());
        assert_eq!(likes, 4);
    }

    #[test]
    fn failure_restores_the_previous_value() {
        let mut likes = 3u64;
        let result: Result<(), &str> = run_optimistic(&mut likes, &Increment(1), || Err("offline"));
        assert_eq!(result, Err("offline"));
        assert_eq!(likes, 3);
    }

    #[test]
    fn remote_sees_the_applied_state() {
        let mut likes = 0u64;
        let observed = std::cell::Cell::new(0);
        let _: Result<(), ()> = run_optimistic(&mut likes, &Increment(2), || {
            observed.set(1);
            Err(())
        });
        assert_eq!(observed.get(), 1);
        assert_eq!(likes, 0);
    }
}
