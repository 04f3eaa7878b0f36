//anything published on a topic: cheap to clone, has a neutral default
pub trait Message: Clone + Default + Send + 'static{}

//blanket impl for all types that meet constraints
impl<T: Clone + Default + Send + 'static> Message for T{}
