//! Domain models for backoffice-service.

mod customer;
mod invoice;
mod line_item;
mod payment;
mod product;
mod purchase_order;
mod sales_order;
mod stock_movement;

pub use customer::{CreateCustomer, Customer, ListCustomersFilter, UpdateCustomer};
pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, UpdateInvoice};
pub use line_item::{InvoiceItem, NewLineItem, PurchaseOrderItem, SalesOrderItem};
pub use payment::{
    CreatePayment, ListPaymentsFilter, Payment, PaymentMethod, PaymentStatus, UpdatePayment,
};
pub use product::{
    CreateProduct, ListProductsFilter, LowStockProduct, Product, ProductStatus, UpdateProduct,
};
pub use purchase_order::{
    CreatePurchaseOrder, ListPurchaseOrdersFilter, PurchaseOrder, PurchaseOrderStatus,
    UpdatePurchaseOrder,
};
pub use sales_order::{
    CreateSalesOrder, ListSalesOrdersFilter, SalesOrder, SalesOrderStatus, UpdateSalesOrder,
};
pub use stock_movement::{
    AdjustStock, CreateStockMovement, ListStockMovementsFilter, MovementType, StockMovement,
};
