mod crud;

pub use crud::CrudService;
